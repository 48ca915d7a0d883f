use crate::{
    error::SourceError,
    qrep::stream::{QRecordSender, QRecordStream},
};
use csv::{Reader, ReaderBuilder, StringRecord};
use model::{core::value::Value, execution::schema::QSchema};
use std::{fs::File, path::Path};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Reads a headered CSV file as a query-replication partition. The header row
/// becomes the schema; cells are typed with [`Value::from_text`].
pub struct CsvRecordReader {
    schema: QSchema,
    reader: Reader<File>,
}

impl CsvRecordReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        let schema = QSchema::new(reader.headers()?.iter());
        Ok(CsvRecordReader { schema, reader })
    }

    pub fn schema(&self) -> &QSchema {
        &self.schema
    }

    /// Opens a stream for this file's schema and starts a blocking task that
    /// feeds it. A read error cancels `session` before the stream closes, so
    /// the consumer never mistakes a half-read file for a complete one.
    pub fn into_stream(
        self,
        capacity: usize,
        session: CancellationToken,
    ) -> (QRecordStream, tokio::task::JoinHandle<Result<u64, SourceError>>) {
        let (tx, stream) = QRecordStream::channel(self.schema.clone(), capacity);
        let handle = tokio::task::spawn_blocking(move || {
            let keep_open = tx.clone();
            let result = self.pump(tx);
            if let Err(e) = &result {
                error!(error = %e, "CSV read failed; cancelling session");
                session.cancel();
            }
            drop(keep_open);
            result
        });
        (stream, handle)
    }

    fn pump(mut self, sender: QRecordSender) -> Result<u64, SourceError> {
        let mut sent = 0u64;
        let mut record = StringRecord::new();

        while self.reader.read_record(&mut record)? {
            let row: Vec<Value> = record.iter().map(Value::from_text).collect();
            if sender.blocking_send(row).is_err() {
                break;
            }
            sent += 1;
        }

        info!(rows = sent, "Finished reading CSV partition");
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn streams_typed_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,name,score").unwrap();
        writeln!(file, "1, ann ,2.5").unwrap();
        writeln!(file, "2,bob,").unwrap();

        let reader = CsvRecordReader::open(file.path()).unwrap();
        assert_eq!(reader.schema().fields, vec!["id", "name", "score"]);

        let (mut stream, handle) = reader.into_stream(4, CancellationToken::new());
        let first = stream.recv().await.unwrap();
        assert_eq!(
            first,
            vec![Value::Int(1), Value::String("ann".into()), Value::Float(2.5)]
        );
        let second = stream.recv().await.unwrap();
        assert_eq!(second[2], Value::Null);
        assert!(stream.recv().await.is_none());
        assert_eq!(handle.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn read_error_cancels_session_before_close() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,name").unwrap();
        writeln!(file, "1,alice").unwrap();
        writeln!(file, "2,bob,extra").unwrap();

        let session = CancellationToken::new();
        let (mut stream, handle) = CsvRecordReader::open(file.path())
            .unwrap()
            .into_stream(4, session.clone());

        assert!(stream.recv().await.is_some());
        // The stream only ends after the session has been cancelled.
        assert!(stream.recv().await.is_none());
        assert!(session.is_cancelled());
        assert!(matches!(handle.await.unwrap(), Err(SourceError::Csv(_))));
    }
}
