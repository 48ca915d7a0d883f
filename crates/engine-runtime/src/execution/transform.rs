use engine_core::metrics::Metrics;
use engine_processing::{
    context::SyncContext, error::SyncError, row_counts::RowCounts,
    script::context::ScriptContext,
};
use model::records::{record::InputRecord, result::TransformResult};

/// Pool task for one record: run the script, count the row, hand back the
/// messages. Script failures go to the session context instead of the caller.
pub(crate) fn transform_task(
    record: InputRecord,
    ctx: SyncContext,
    row_counts: Option<RowCounts>,
    metrics: Metrics,
) -> impl FnOnce(&mut ScriptContext) -> Option<TransformResult> + Send + 'static {
    move |script: &mut ScriptContext| match script.on_record(&record) {
        Ok(messages) => {
            if let Some(counts) = &row_counts {
                counts.record(&record);
            }
            metrics.increment_records(1);
            Some(TransformResult::new(messages, record.checkpoint()))
        }
        Err(err) => {
            ctx.cancel_with(SyncError::Script(err));
            None
        }
    }
}
