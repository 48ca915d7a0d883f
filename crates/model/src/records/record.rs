use crate::{
    core::{items::RecordItems, value::Value},
    execution::summary::TableRowCount,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Insert,
    Update,
    Delete,
    /// Schema change marker emitted by the CDC stream; carries no row data.
    Relation,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Insert => "insert",
            RecordKind::Update => "update",
            RecordKind::Delete => "delete",
            RecordKind::Relation => "relation",
        }
    }
}

/// A change event or extracted row handed to the transform stage.
///
/// `checkpoint_id` is non-decreasing across one upstream stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRecord {
    pub kind: RecordKind,
    #[serde(default)]
    pub source_table: String,
    pub destination_table: String,
    #[serde(default)]
    pub checkpoint_id: i64,
    #[serde(default)]
    pub commit_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: RecordItems,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_items: Option<RecordItems>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unchanged_columns: Vec<String>,
}

impl InputRecord {
    pub fn new(kind: RecordKind, destination_table: impl Into<String>, checkpoint_id: i64) -> Self {
        InputRecord {
            kind,
            source_table: String::new(),
            destination_table: destination_table.into(),
            checkpoint_id,
            commit_id: 0,
            commit_time: None,
            items: RecordItems::new(),
            old_items: None,
            unchanged_columns: Vec::new(),
        }
    }

    pub fn insert(destination_table: impl Into<String>, checkpoint_id: i64) -> Self {
        Self::new(RecordKind::Insert, destination_table, checkpoint_id)
    }

    pub fn with_source(mut self, source_table: impl Into<String>) -> Self {
        self.source_table = source_table.into();
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, value: Value) -> Self {
        self.items.add_column(name, value);
        self
    }

    pub fn with_items(mut self, items: RecordItems) -> Self {
        self.items = items;
        self
    }

    pub fn destination(&self) -> &str {
        &self.destination_table
    }

    pub fn checkpoint(&self) -> i64 {
        self.checkpoint_id
    }

    /// Adds this record's contribution to the per-table row counts.
    pub fn count_into(&self, counts: &mut HashMap<String, TableRowCount>) {
        if self.kind == RecordKind::Relation {
            return;
        }
        let entry = counts
            .entry(self.destination_table.clone())
            .or_default();
        match self.kind {
            RecordKind::Insert => entry.insert_count += 1,
            RecordKind::Update => entry.update_count += 1,
            RecordKind::Delete => entry.delete_count += 1,
            RecordKind::Relation => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cdc_json_line() {
        let line = r#"{"kind":"update","destination_table":"public.users","checkpoint_id":20,
            "items":{"id":1,"name":"new"},"old_items":{"id":1,"name":"old"}}"#;
        let record: InputRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.kind, RecordKind::Update);
        assert_eq!(record.checkpoint(), 20);
        assert_eq!(record.items.get("name"), Some(&Value::String("new".into())));
        assert!(record.old_items.is_some());
    }

    #[test]
    fn counts_by_kind_and_skips_relations() {
        let mut counts = HashMap::new();
        InputRecord::insert("t", 1).count_into(&mut counts);
        InputRecord::new(RecordKind::Delete, "t", 2).count_into(&mut counts);
        InputRecord::new(RecordKind::Relation, "t", 3).count_into(&mut counts);

        let t = &counts["t"];
        assert_eq!((t.insert_count, t.update_count, t.delete_count), (1, 0, 1));
    }
}
