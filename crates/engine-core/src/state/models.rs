use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct OffsetState {
    pub offset: i64,
    pub sync_batch_id: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OffsetState {
    /// Applies a periodic offset update. Returns false when it would regress.
    pub fn advance_offset(&mut self, offset: i64) -> bool {
        if offset <= self.offset {
            return false;
        }
        self.offset = offset;
        self.updated_at = Some(Utc::now());
        true
    }

    /// Applies a session-final commit; both fields keep their running maximum.
    pub fn finish_batch(&mut self, batch_id: i64, offset: i64) {
        self.offset = self.offset.max(offset);
        self.sync_batch_id = self.sync_batch_id.max(batch_id);
        self.updated_at = Some(Utc::now());
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PartitionRun {
    pub partition_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_offset_never_regresses() {
        let mut state = OffsetState::default();
        assert!(state.advance_offset(20));
        assert!(!state.advance_offset(10));
        assert!(!state.advance_offset(20));
        assert_eq!(state.offset, 20);
    }

    #[test]
    fn final_commit_is_idempotent_against_periodic_writes() {
        let mut state = OffsetState::default();
        state.finish_batch(3, 30);
        // A late periodic write from the same session must not undo it.
        assert!(!state.advance_offset(25));
        state.finish_batch(3, 30);
        assert_eq!((state.sync_batch_id, state.offset), (3, 30));
    }
}
