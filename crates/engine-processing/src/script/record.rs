use mlua::{Lua, LuaSerdeExt, SerializeOptions, Value as LuaValue};
use model::{core::items::RecordItems, records::record::InputRecord};
use serde::Serialize;

/// Shape of the record as `onRecord` sees it.
#[derive(Serialize)]
struct RecordView<'a> {
    kind: &'static str,
    checkpoint_id: i64,
    commit_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit_time: Option<String>,
    source: &'a str,
    target: &'a str,
    row: &'a RecordItems,
    #[serde(skip_serializing_if = "Option::is_none")]
    old_row: Option<&'a RecordItems>,
    unchanged_columns: &'a [String],
}

impl<'a> From<&'a InputRecord> for RecordView<'a> {
    fn from(record: &'a InputRecord) -> Self {
        RecordView {
            kind: record.kind.as_str(),
            checkpoint_id: record.checkpoint_id,
            commit_id: record.commit_id,
            commit_time: record.commit_time.map(|t| t.to_rfc3339()),
            source: &record.source_table,
            target: &record.destination_table,
            row: &record.items,
            old_row: record.old_items.as_ref(),
            unchanged_columns: &record.unchanged_columns,
        }
    }
}

/// Options shared by every Rust to Lua conversion: SQL NULL and JSON null
/// both become `nil`.
pub(crate) fn to_lua_options() -> SerializeOptions {
    SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false)
}

/// Encodes `record` as JSON in the same shape `onRecord` receives, keeping
/// NULL columns as `null` and byte columns as arrays.
pub fn record_to_json(record: &InputRecord) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&RecordView::from(record))
}

/// Converts `record` into a fresh Lua table.
pub fn record_to_lua(lua: &Lua, record: &InputRecord) -> mlua::Result<LuaValue> {
    lua.to_value_with(&RecordView::from(record), to_lua_options())
}
