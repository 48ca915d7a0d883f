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
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;
use tracing::debug;

pub struct SledMetadataStore {
    db: sled::Db,
}

impl SledMetadataStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { db })
    }

    #[inline]
    fn offset_key(flow: &str) -> String {
        format!("offset:{flow}")
    }

    #[inline]
    fn partition_key(flow: &str, partition_id: &str) -> String {
        format!("partition:{flow}:{partition_id}")
    }

    fn load_state(&self, flow: &str) -> Result<OffsetState, StoreError> {
        let load_err = |message: String| StoreError::Load {
            flow: flow.to_string(),
            message,
        };
        match self
            .db
            .get(Self::offset_key(flow))
            .map_err(|e| load_err(e.to_string()))?
        {
            Some(bytes) => bincode::deserialize(&bytes).map_err(|e| load_err(e.to_string())),
            None => Ok(OffsetState::default()),
        }
    }

    /// Read-modify-write of the flow's offset state inside a sled transaction,
    /// so a periodic write and the final commit can never interleave halfway.
    fn update_state<F>(&self, flow: &str, apply: F) -> Result<bool, TransactionError<StoreError>>
    where
        F: Fn(&mut OffsetState) -> bool,
    {
        let key = Self::offset_key(flow);

        self.db.transaction::<_, _, StoreError>(|tx_db| {
            let mut state = match tx_db.get(key.as_bytes())? {
                Some(bytes) => bincode::deserialize::<OffsetState>(&bytes).map_err(|e| {
                    ConflictableTransactionError::Abort(StoreError::Serialization(e.to_string()))
                })?,
                None => OffsetState::default(),
            };

            if !apply(&mut state) {
                return Ok(false);
            }

            let bytes = bincode::serialize(&state).map_err(|e| {
                ConflictableTransactionError::Abort(StoreError::Serialization(e.to_string()))
            })?;
            tx_db.insert(key.as_bytes(), bytes)?;
            Ok(true)
        })
    }

    async fn sync(&self) -> Result<(), sled::Error> {
        self.db.flush_async().await.map(|_| ())
    }
}

fn unwrap_tx(
    err: TransactionError<StoreError>,
    on_storage: impl FnOnce(String) -> StoreError,
) -> StoreError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => on_storage(e.to_string()),
    }
}

#[async_trait]
impl MetadataStore for SledMetadataStore {
    async fn last_offset(&self, flow: &str) -> Result<i64, StoreError> {
        Ok(self.load_state(flow)?.offset)
    }

    async fn set_last_offset(&self, flow: &str, offset: i64) -> Result<(), StoreError> {
        let save_err = |message| StoreError::Save {
            flow: flow.to_string(),
            message,
        };
        let updated = self
            .update_state(flow, |state| state.advance_offset(offset))
            .map_err(|e| unwrap_tx(e, save_err))?;

        if !updated {
            debug!(flow = %flow, offset, "Stored offset already at or past update, skipping.");
        }
        Ok(())
    }

    async fn last_sync_batch_id(&self, flow: &str) -> Result<i64, StoreError> {
        Ok(self.load_state(flow)?.sync_batch_id)
    }

    async fn finish_batch(
        &self,
        flow: &str,
        batch_id: i64,
        offset: i64,
    ) -> Result<(), StoreError> {
        let finish_err = |message| StoreError::Finish {
            flow: flow.to_string(),
            what: format!("batch {batch_id}"),
            message,
        };
        self.update_state(flow, |state| {
            state.finish_batch(batch_id, offset);
            true
        })
        .map_err(|e| unwrap_tx(e, finish_err))?;

        // The final commit has to survive a crash right after the session returns.
        self.sync().await.map_err(|e| StoreError::Finish {
            flow: flow.to_string(),
            what: format!("batch {batch_id}"),
            message: e.to_string(),
        })
    }

    async fn finish_partition(
        &self,
        flow: &str,
        partition: &QRepPartition,
        started_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let finish_err = |message: String| StoreError::Finish {
            flow: flow.to_string(),
            what: format!("partition {}", partition.partition_id),
            message,
        };
        let run = PartitionRun {
            partition_id: partition.partition_id.clone(),
            started_at,
            finished_at: Utc::now(),
        };
        let bytes = bincode::serialize(&run).map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.db
            .insert(Self::partition_key(flow, &partition.partition_id), bytes)
            .map_err(|e| finish_err(e.to_string()))?;
        self.sync().await.map_err(|e| finish_err(e.to_string()))
    }

    async fn partition_run(
        &self,
        flow: &str,
        partition_id: &str,
    ) -> Result<Option<PartitionRun>, StoreError> {
        let load_err = |message: String| StoreError::Load {
            flow: flow.to_string(),
            message,
        };
        match self
            .db
            .get(Self::partition_key(flow, partition_id))
            .map_err(|e| load_err(e.to_string()))?
        {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).map_err(|e| load_err(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }
}
