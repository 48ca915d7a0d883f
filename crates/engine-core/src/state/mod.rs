use crate::{error::StoreError, state::models::PartitionRun};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::execution::partition::QRepPartition;

pub mod memory;
pub mod models;
pub mod sled_store;

/// Durable offset and sync-progress storage.
///
/// Offsets only move forward: saving an offset lower than the stored one is
/// accepted and ignored, which keeps periodic best-effort writes from ever
/// undoing the authoritative final commit of a session.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn last_offset(&self, flow: &str) -> Result<i64, StoreError>;

    /// Best-effort periodic persistence of the confirmed watermark.
    async fn set_last_offset(&self, flow: &str, offset: i64) -> Result<(), StoreError>;

    async fn last_sync_batch_id(&self, flow: &str) -> Result<i64, StoreError>;

    /// Final commit of a CDC session: records the batch id together with its
    /// last checkpoint.
    async fn finish_batch(&self, flow: &str, batch_id: i64, offset: i64)
    -> Result<(), StoreError>;

    /// Final commit of a query-replication partition.
    async fn finish_partition(
        &self,
        flow: &str,
        partition: &QRepPartition,
        started_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn partition_run(
        &self,
        flow: &str,
        partition_id: &str,
    ) -> Result<Option<PartitionRun>, StoreError>;
}
