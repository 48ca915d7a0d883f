use serde::{Deserialize, Serialize};

/// One slice of a query-replication run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QRepPartition {
    pub partition_id: String,
}

impl QRepPartition {
    pub fn new(partition_id: impl Into<String>) -> Self {
        QRepPartition {
            partition_id: partition_id.into(),
        }
    }
}

/// Batch-mode sync parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QRepConfig {
    pub flow_job_name: String,
    /// Recorded as the source table of every synthesized record.
    pub watermark_table: String,
    pub destination_table: String,
    #[serde(default)]
    pub script: String,
}
