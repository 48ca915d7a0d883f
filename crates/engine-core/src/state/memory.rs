use crate::{
    error::StoreError,
    state::{
        MetadataStore,
        models::{OffsetState, PartitionRun},
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::execution::partition::QRepPartition;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Process-local store for tests and dry runs.
#[derive(Default)]
pub struct MemoryMetadataStore {
    offsets: Mutex<HashMap<String, OffsetState>>,
    partitions: Mutex<HashMap<(String, String), PartitionRun>>,
    offset_writes: Mutex<Vec<(String, i64)>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a flow at a previously committed offset.
    pub async fn seed(&self, flow: &str, offset: i64, sync_batch_id: i64) {
        let mut offsets = self.offsets.lock().await;
        offsets.insert(
            flow.to_string(),
            OffsetState {
                offset,
                sync_batch_id,
                updated_at: None,
            },
        );
    }

    /// Every periodic offset save in arrival order, accepted or not.
    pub async fn offset_writes(&self) -> Vec<(String, i64)> {
        self.offset_writes.lock().await.clone()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn last_offset(&self, flow: &str) -> Result<i64, StoreError> {
        let offsets = self.offsets.lock().await;
        Ok(offsets.get(flow).map(|s| s.offset).unwrap_or_default())
    }

    async fn set_last_offset(&self, flow: &str, offset: i64) -> Result<(), StoreError> {
        self.offset_writes
            .lock()
            .await
            .push((flow.to_string(), offset));

        let mut offsets = self.offsets.lock().await;
        offsets
            .entry(flow.to_string())
            .or_default()
            .advance_offset(offset);
        Ok(())
    }

    async fn last_sync_batch_id(&self, flow: &str) -> Result<i64, StoreError> {
        let offsets = self.offsets.lock().await;
        Ok(offsets
            .get(flow)
            .map(|s| s.sync_batch_id)
            .unwrap_or_default())
    }

    async fn finish_batch(
        &self,
        flow: &str,
        batch_id: i64,
        offset: i64,
    ) -> Result<(), StoreError> {
        let mut offsets = self.offsets.lock().await;
        offsets
            .entry(flow.to_string())
            .or_default()
            .finish_batch(batch_id, offset);
        Ok(())
    }

    async fn finish_partition(
        &self,
        flow: &str,
        partition: &QRepPartition,
        started_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let run = PartitionRun {
            partition_id: partition.partition_id.clone(),
            started_at,
            finished_at: Utc::now(),
        };
        let mut partitions = self.partitions.lock().await;
        partitions.insert((flow.to_string(), partition.partition_id.clone()), run);
        Ok(())
    }

    async fn partition_run(
        &self,
        flow: &str,
        partition_id: &str,
    ) -> Result<Option<PartitionRun>, StoreError> {
        let partitions = self.partitions.lock().await;
        Ok(partitions
            .get(&(flow.to_string(), partition_id.to_string()))
            .cloned())
    }
}
