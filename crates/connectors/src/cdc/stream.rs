use crate::error::SourceError;
use model::{execution::schema::SchemaDelta, records::record::InputRecord};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct StreamState {
    last_checkpoint: i64,
    schema_deltas: Vec<SchemaDelta>,
}

fn lock(state: &Mutex<StreamState>) -> MutexGuard<'_, StreamState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Producer half of a CDC stream. The stream ends once every sender is dropped.
#[derive(Clone)]
pub struct CdcRecordSender {
    tx: mpsc::Sender<InputRecord>,
    state: Arc<Mutex<StreamState>>,
}

impl CdcRecordSender {
    /// Waits for channel capacity, then records the checkpoint as seen.
    pub async fn send(&self, record: InputRecord) -> Result<(), SourceError> {
        let checkpoint = record.checkpoint();
        self.tx.send(record).await.map_err(|_| SourceError::Closed)?;

        let mut state = lock(&self.state);
        state.last_checkpoint = state.last_checkpoint.max(checkpoint);
        Ok(())
    }

    pub fn add_schema_delta(&self, delta: SchemaDelta) {
        lock(&self.state).schema_deltas.push(delta);
    }
}

/// Consumer half of a CDC stream of change records.
pub struct CdcRecordStream {
    rx: mpsc::Receiver<InputRecord>,
    state: Arc<Mutex<StreamState>>,
}

impl CdcRecordStream {
    pub fn channel(capacity: usize) -> (CdcRecordSender, CdcRecordStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let state = Arc::new(Mutex::new(StreamState::default()));
        (
            CdcRecordSender {
                tx,
                state: state.clone(),
            },
            CdcRecordStream { rx, state },
        )
    }

    /// Next record, or `None` once all senders are gone and the buffer is drained.
    pub async fn recv(&mut self) -> Option<InputRecord> {
        self.rx.recv().await
    }

    /// Highest checkpoint handed to the stream so far.
    pub fn last_checkpoint(&self) -> i64 {
        lock(&self.state).last_checkpoint
    }

    pub fn schema_deltas(&self) -> Vec<SchemaDelta> {
        lock(&self.state).schema_deltas.clone()
    }
}
