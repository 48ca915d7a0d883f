use crate::{
    connector::KafkaConnector,
    execution::{request::SyncRequest, transform::transform_task},
};
use engine_core::{metrics::Metrics, watermark::Watermark};
use engine_processing::{
    context::SyncContext, error::SyncError, protocol::Dispatcher, row_counts::RowCounts,
    scheduler::FlushScheduler,
};
use model::execution::summary::{SyncSummary, initial_row_counts};
use std::sync::{Arc, atomic::Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

impl KafkaConnector {
    /// Runs one CDC session: transform and produce every record of the
    /// stream, then commit the stream's last checkpoint.
    ///
    /// Any script, delivery or drain failure aborts the session without a
    /// final commit; the caller retries from the last persisted offset.
    pub async fn sync_records(
        &self,
        mut req: SyncRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncSummary, SyncError> {
        let flow = req.flow_job_name.clone();
        let ctx = SyncContext::new(cancel);
        let metrics = Metrics::new();
        let watermark = Arc::new(Watermark::new(0));
        let row_counts = RowCounts::new(initial_row_counts(&req.table_mappings));

        let dispatcher = Dispatcher::new(
            self.broker.clone(),
            Some(watermark.clone()),
            ctx.clone(),
            metrics.clone(),
        );
        let mut pool = self.create_pool(&req.script, &flow, dispatcher, &ctx).await?;

        let scheduler = FlushScheduler::new(
            self.broker.clone(),
            self.store.clone(),
            flow.clone(),
            watermark.clone(),
            req.consumed_offset.clone(),
            self.settings.flush_interval(),
            metrics.clone(),
        )
        .spawn(&ctx);

        info!(flow = %flow, batch = req.sync_batch_id, workers = pool.size(), "Starting sync");

        loop {
            let record = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                record = req.records.recv() => record,
            };
            let Some(record) = record else {
                info!(flow = %flow, "flushing batches because no more records");
                break;
            };

            let task = transform_task(
                record,
                ctx.clone(),
                Some(row_counts.clone()),
                metrics.clone(),
            );
            if pool.run(task).await.is_err() {
                break;
            }
        }

        scheduler.stop().await;
        let drained = self.drain(&mut pool, &ctx).await;
        pool.close();
        if let Err(err) = drained {
            warn!(flow = %flow, error = %err, "Sync aborted before final commit");
            return Err(err);
        }

        let last_checkpoint = req.records.last_checkpoint();
        self.store
            .finish_batch(&flow, req.sync_batch_id, last_checkpoint)
            .await
            .map_err(|e| SyncError::Finalize(e.to_string()))?;
        req.consumed_offset.fetch_max(last_checkpoint, Ordering::AcqRel);

        let stats = metrics.snapshot();
        info!(
            flow = %flow,
            batch = req.sync_batch_id,
            records = stats.records_processed,
            messages = stats.messages_produced,
            last_checkpoint,
            "Sync finished"
        );

        Ok(SyncSummary {
            sync_batch_id: req.sync_batch_id,
            last_checkpoint,
            records_synced: stats.records_processed as i64,
            confirmed_checkpoint: watermark.get(),
            table_rows: row_counts.snapshot(),
            schema_deltas: req.records.schema_deltas(),
        })
    }
}
