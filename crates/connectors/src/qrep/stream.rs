use crate::error::SourceError;
use model::{
    core::{items::RecordItems, value::Value},
    execution::{partition::QRepConfig, schema::QSchema},
    records::record::InputRecord,
};
use tokio::sync::mpsc;

pub type QRow = Vec<Value>;

#[derive(Clone)]
pub struct QRecordSender {
    tx: mpsc::Sender<QRow>,
}

impl QRecordSender {
    pub async fn send(&self, row: QRow) -> Result<(), SourceError> {
        self.tx.send(row).await.map_err(|_| SourceError::Closed)
    }

    /// For readers running on a blocking thread.
    pub fn blocking_send(&self, row: QRow) -> Result<(), SourceError> {
        self.tx.blocking_send(row).map_err(|_| SourceError::Closed)
    }
}

/// Rows of one query-replication partition, in the order of `schema`.
pub struct QRecordStream {
    schema: QSchema,
    rx: mpsc::Receiver<QRow>,
}

impl QRecordStream {
    pub fn channel(schema: QSchema, capacity: usize) -> (QRecordSender, QRecordStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (QRecordSender { tx }, QRecordStream { schema, rx })
    }

    pub fn schema(&self) -> &QSchema {
        &self.schema
    }

    pub async fn recv(&mut self) -> Option<QRow> {
        self.rx.recv().await
    }
}

/// Shapes a row as an insert into the partition's destination. Extra values
/// beyond the schema are ignored.
pub fn row_to_record(schema: &QSchema, row: QRow, config: &QRepConfig) -> InputRecord {
    let items: RecordItems = schema.fields.iter().cloned().zip(row).collect();
    InputRecord::insert(config.destination_table.clone(), 0)
        .with_source(config.watermark_table.clone())
        .with_items(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::records::record::RecordKind;

    #[tokio::test]
    async fn rows_become_inserts_for_destination() {
        let schema = QSchema::new(["id", "name"]);
        let (tx, mut stream) = QRecordStream::channel(schema, 2);
        tx.send(vec![Value::Int(1), Value::String("ann".into())])
            .await
            .unwrap();
        drop(tx);

        let config = QRepConfig {
            flow_job_name: "f".into(),
            watermark_table: "public.users".into(),
            destination_table: "users_topic".into(),
            script: String::new(),
        };
        let row = stream.recv().await.unwrap();
        let record = row_to_record(stream.schema(), row, &config);

        assert_eq!(record.kind, RecordKind::Insert);
        assert_eq!(record.destination(), "users_topic");
        assert_eq!(record.source_table, "public.users");
        assert_eq!(record.checkpoint(), 0);
        assert_eq!(record.items.get("name"), Some(&Value::String("ann".into())));
        assert!(stream.recv().await.is_none());
    }
}
