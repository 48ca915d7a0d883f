use crate::{
    connector::KafkaConnector,
    execution::{heartbeat, transform::transform_task},
};
use chrono::Utc;
use connectors::qrep::stream::{QRecordStream, row_to_record};
use engine_core::metrics::Metrics;
use engine_processing::{context::SyncContext, error::SyncError, protocol::Dispatcher};
use model::execution::partition::{QRepConfig, QRepPartition};
use tokio_util::sync::CancellationToken;
use tracing::info;

impl KafkaConnector {
    /// Produces one query-replication partition. No checkpoints are tracked;
    /// completion is recorded per partition. Returns the number of rows synced.
    pub async fn sync_qrep_records(
        &self,
        config: &QRepConfig,
        partition: &QRepPartition,
        mut stream: QRecordStream,
        cancel: &CancellationToken,
    ) -> Result<u64, SyncError> {
        let started_at = Utc::now();
        let flow = &config.flow_job_name;
        let ctx = SyncContext::new(cancel);
        let metrics = Metrics::new();

        let _heartbeat = {
            let metrics = metrics.clone();
            let destination = config.destination_table.clone();
            heartbeat::spawn(self.settings.heartbeat_interval(), ctx.token(), move || {
                format!("sent {} records to {}", metrics.records_processed(), destination)
            })
        };

        let dispatcher = Dispatcher::new(self.broker.clone(), None, ctx.clone(), metrics.clone());
        let mut pool = self.create_pool(&config.script, flow, dispatcher, &ctx).await?;

        info!(
            flow = %flow,
            partition = %partition.partition_id,
            destination = %config.destination_table,
            "Starting partition sync"
        );

        loop {
            let row = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                row = stream.recv() => row,
            };
            let Some(row) = row else {
                info!(flow = %flow, "flushing batches because no more records");
                break;
            };

            let record = row_to_record(stream.schema(), row, config);
            if pool
                .run(transform_task(record, ctx.clone(), None, metrics.clone()))
                .await
                .is_err()
            {
                break;
            }
        }

        let drained = self.drain(&mut pool, &ctx).await;
        pool.close();
        drained?;

        self.store
            .finish_partition(flow, partition, started_at)
            .await
            .map_err(|e| SyncError::Finalize(e.to_string()))?;

        let records = metrics.records_processed();
        info!(flow = %flow, partition = %partition.partition_id, records, "Partition synced");
        Ok(records)
    }
}
