use model::{execution::summary::TableRowCount, records::record::InputRecord};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

/// Per-destination insert/update/delete counts, shared by all workers.
#[derive(Clone, Debug, Default)]
pub struct RowCounts {
    inner: Arc<Mutex<HashMap<String, TableRowCount>>>,
}

impl RowCounts {
    pub fn new(initial: HashMap<String, TableRowCount>) -> Self {
        RowCounts {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn record(&self, record: &InputRecord) {
        record.count_into(&mut self.lock());
    }

    pub fn snapshot(&self) -> HashMap<String, TableRowCount> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TableRowCount>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
