use crate::execution::schema::SchemaDelta;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRowCount {
    pub insert_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
}

impl TableRowCount {
    pub fn total(&self) -> u64 {
        self.insert_count + self.update_count + self.delete_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    pub source_table: String,
    pub destination_table: String,
}

/// Seeds a row-count map with every mapped destination, so tables that saw no
/// changes still show up with zero counts.
pub fn initial_row_counts(mappings: &[TableMapping]) -> HashMap<String, TableRowCount> {
    mappings
        .iter()
        .map(|m| (m.destination_table.clone(), TableRowCount::default()))
        .collect()
}

/// Result of one CDC sync session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    pub sync_batch_id: i64,
    pub last_checkpoint: i64,
    pub records_synced: i64,
    /// Highest checkpoint whose messages were all confirmed by the broker.
    pub confirmed_checkpoint: i64,
    pub table_rows: HashMap<String, TableRowCount>,
    pub schema_deltas: Vec<SchemaDelta>,
}
