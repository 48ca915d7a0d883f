use crate::FLOW;
use connectors::cdc::stream::CdcRecordStream;
use engine_processing::error::SyncError;
use engine_runtime::{connector::KafkaConnector, execution::request::SyncRequest};
use model::{
    core::value::Value,
    execution::summary::{SyncSummary, TableMapping},
    records::record::InputRecord,
};
use tokio_util::sync::CancellationToken;

/// Inserts into `orders` with the given checkpoints and `id` = checkpoint.
pub fn orders(checkpoints: &[i64]) -> Vec<InputRecord> {
    checkpoints
        .iter()
        .map(|&cp| InputRecord::insert("orders", cp).with_column("id", Value::Int(cp)))
        .collect()
}

pub fn mapping(source: &str, destination: &str) -> TableMapping {
    TableMapping {
        source_table: source.into(),
        destination_table: destination.into(),
    }
}

/// Feeds `records` through a fresh stream and runs one CDC session as batch 1.
pub async fn run_sync(
    connector: &KafkaConnector,
    script: &str,
    records: Vec<InputRecord>,
    mappings: Vec<TableMapping>,
) -> Result<SyncSummary, SyncError> {
    let (sender, stream) = CdcRecordStream::channel(16);
    tokio::spawn(async move {
        for record in records {
            // The session may have stopped reading already.
            if sender.send(record).await.is_err() {
                break;
            }
        }
    });

    let request = SyncRequest::new(FLOW, 1, stream)
        .with_script(script)
        .with_table_mappings(mappings);
    connector
        .sync_records(request, &CancellationToken::new())
        .await
}
