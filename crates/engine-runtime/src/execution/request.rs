use connectors::cdc::stream::CdcRecordStream;
use model::execution::summary::TableMapping;
use std::sync::{Arc, atomic::AtomicI64};

/// One CDC sync session's input.
pub struct SyncRequest {
    pub flow_job_name: String,
    pub sync_batch_id: i64,
    /// Lua source defining `onRecord`; empty means pass-through.
    pub script: String,
    pub records: CdcRecordStream,
    pub table_mappings: Vec<TableMapping>,
    /// Last offset known to be persisted. Shared with the caller and raised
    /// as the session persists progress.
    pub consumed_offset: Arc<AtomicI64>,
}

impl SyncRequest {
    pub fn new(
        flow_job_name: impl Into<String>,
        sync_batch_id: i64,
        records: CdcRecordStream,
    ) -> Self {
        SyncRequest {
            flow_job_name: flow_job_name.into(),
            sync_batch_id,
            script: String::new(),
            records,
            table_mappings: Vec::new(),
            consumed_offset: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    pub fn with_table_mappings(mut self, mappings: Vec<TableMapping>) -> Self {
        self.table_mappings = mappings;
        self
    }

    pub fn with_consumed_offset(mut self, consumed_offset: Arc<AtomicI64>) -> Self {
        self.consumed_offset = consumed_offset;
        self
    }
}
