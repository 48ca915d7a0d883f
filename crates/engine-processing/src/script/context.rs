use crate::{
    error::ScriptError,
    script::{
        decode::decode_returns,
        record::{record_to_json, record_to_lua, to_lua_options},
    },
};
use mlua::{Function, Lua, LuaSerdeExt, MultiValue, Result as LuaResult, Table, Value as LuaValue};
use model::records::{
    message::OutboundMessage,
    record::{InputRecord, RecordKind},
};
use serde_json::Value as Json;
use tracing::info;

const ENTRYPOINT: &str = "onRecord";
const MAX_JSON_DEPTH: usize = 64;

enum Transform {
    /// No script: records are emitted as their JSON encoding.
    PassThrough,
    Script(Lua),
}

/// One Lua state with a loaded transform. Not thread-safe; each pool worker
/// owns its own.
pub struct ScriptContext {
    transform: Transform,
}

impl ScriptContext {
    /// Loads `source` and checks that it defines `onRecord`. An empty source
    /// selects the pass-through transform.
    pub fn load(source: &str, flow: &str) -> Result<Self, ScriptError> {
        if source.trim().is_empty() {
            return Ok(ScriptContext {
                transform: Transform::PassThrough,
            });
        }

        let lua = Lua::new();
        install_globals(&lua, flow).map_err(|e| ScriptError::Load(e.to_string()))?;
        lua.load(source)
            .set_name(format!("={flow}"))
            .exec()
            .map_err(|e| ScriptError::Load(e.to_string()))?;

        entrypoint(&lua)?;
        Ok(ScriptContext {
            transform: Transform::Script(lua),
        })
    }

    /// Runs `onRecord` for `record` and decodes what it returned.
    pub fn on_record(&self, record: &InputRecord) -> Result<Vec<OutboundMessage>, ScriptError> {
        let lua = match &self.transform {
            Transform::PassThrough => return pass_through(record),
            Transform::Script(lua) => lua,
        };

        let entrypoint = entrypoint(lua)?;
        let arg =
            record_to_lua(lua, record).map_err(|e| ScriptError::Conversion(e.to_string()))?;

        let returned: MultiValue = entrypoint
            .call(arg)
            .map_err(|e| ScriptError::Runtime(e.to_string()))?;

        Ok(decode_returns(returned, record.destination())?)
    }
}

fn entrypoint(lua: &Lua) -> Result<Function, ScriptError> {
    match lua.globals().get::<LuaValue>(ENTRYPOINT) {
        Ok(LuaValue::Function(f)) => Ok(f),
        Ok(other) => Err(ScriptError::MissingEntrypoint(other.type_name().to_string())),
        Err(e) => Err(ScriptError::Load(e.to_string())),
    }
}

/// Relation records yield nothing; anything else is sent to its destination
/// as JSON text.
fn pass_through(record: &InputRecord) -> Result<Vec<OutboundMessage>, ScriptError> {
    if record.kind == RecordKind::Relation {
        return Ok(Vec::new());
    }
    let json = record_to_json(record).map_err(|e| ScriptError::Conversion(e.to_string()))?;
    Ok(vec![OutboundMessage::text(json, record.destination())])
}

/// Converts a Lua value to JSON. Strings that are not UTF-8 are replaced
/// lossily rather than rejected.
fn lua_to_json(value: LuaValue, depth: usize) -> LuaResult<Json> {
    if depth > MAX_JSON_DEPTH {
        return Err(mlua::Error::runtime("json.encode: nesting too deep"));
    }

    let json = match value {
        LuaValue::Nil => Json::Null,
        LuaValue::LightUserData(ud) if ud.0.is_null() => Json::Null,
        LuaValue::Boolean(b) => Json::Bool(b),
        LuaValue::Integer(n) => Json::from(n),
        LuaValue::Number(n) => serde_json::Number::from_f64(n).map_or(Json::Null, Json::Number),
        LuaValue::String(s) => Json::String(s.to_string_lossy().to_string()),
        LuaValue::Table(table) => {
            let len = table.raw_len();
            let entries = table.clone().pairs::<LuaValue, LuaValue>().count();
            if len > 0 && entries == len {
                let items = table
                    .sequence_values::<LuaValue>()
                    .map(|v| lua_to_json(v?, depth + 1))
                    .collect::<LuaResult<Vec<_>>>()?;
                Json::Array(items)
            } else {
                let mut map = serde_json::Map::new();
                for pair in table.pairs::<LuaValue, LuaValue>() {
                    let (key, value) = pair?;
                    let key = match key {
                        LuaValue::String(s) => s.to_string_lossy().to_string(),
                        LuaValue::Integer(n) => n.to_string(),
                        LuaValue::Number(n) => n.to_string(),
                        other => {
                            return Err(mlua::Error::runtime(format!(
                                "json.encode: unsupported key type {}",
                                other.type_name()
                            )));
                        }
                    };
                    map.insert(key, lua_to_json(value, depth + 1)?);
                }
                Json::Object(map)
            }
        }
        other => {
            return Err(mlua::Error::runtime(format!(
                "json.encode: cannot encode {}",
                other.type_name()
            )));
        }
    };
    Ok(json)
}

fn install_globals(lua: &Lua, flow: &str) -> LuaResult<()> {
    let globals = lua.globals();

    // print(...) -- joined with tabs, like the stock print
    let flow_name = flow.to_string();
    let print_fn = lua.create_function(move |_, args: MultiValue| {
        let line = args.iter().map(display_value).collect::<Vec<_>>().join("\t");
        info!(target: "script", flow = %flow_name, "{}", line);
        Ok(())
    })?;
    globals.set("print", print_fn)?;

    let json: Table = lua.create_table()?;
    json.set(
        "encode",
        lua.create_function(|_, value: LuaValue| {
            let json = lua_to_json(value, 0)?;
            serde_json::to_string(&json).map_err(mlua::Error::external)
        })?,
    )?;
    json.set(
        "decode",
        lua.create_function(|lua, text: String| {
            let value: Json = serde_json::from_str(&text).map_err(mlua::Error::external)?;
            lua.to_value_with(&value, to_lua_options())
        })?,
    )?;
    globals.set("json", json)?;

    Ok(())
}

fn display_value(value: &LuaValue) -> String {
    match value {
        LuaValue::Nil => "nil".to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Integer(n) => n.to_string(),
        LuaValue::Number(n) => n.to_string(),
        LuaValue::String(s) => s.to_string_lossy().to_string(),
        other => other.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;
    use tracing_test::traced_test;

    fn sample() -> InputRecord {
        InputRecord::insert("users", 10)
            .with_column("id", Value::Int(1))
            .with_column("name", Value::String("ann".into()))
    }

    #[test]
    fn default_transform_passes_record_through() {
        let context = ScriptContext::load("", "flow").unwrap();
        let messages = context.on_record(&sample()).unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "users");
        assert_eq!(messages[0].key, None);
        let body: serde_json::Value =
            serde_json::from_slice(messages[0].value.as_deref().unwrap()).unwrap();
        assert_eq!(body["kind"], "insert");
        assert_eq!(body["checkpoint_id"], 10);
        assert_eq!(body["target"], "users");
        assert_eq!(body["row"]["name"], "ann");
    }

    #[test]
    fn default_transform_skips_relations() {
        let context = ScriptContext::load("  ", "flow").unwrap();
        let record = InputRecord::new(RecordKind::Relation, "users", 5);
        assert!(context.on_record(&record).unwrap().is_empty());
    }

    #[test]
    fn default_transform_keeps_bytes_and_nulls() {
        let context = ScriptContext::load("", "flow").unwrap();
        let record = sample()
            .with_column("bio", Value::Null)
            .with_column("blob", Value::Bytes(vec![1, 2, 0xff]));

        let messages = context.on_record(&record).unwrap();
        let body: serde_json::Value =
            serde_json::from_slice(messages[0].value.as_deref().unwrap()).unwrap();
        let row = body["row"].as_object().unwrap();
        assert!(row.contains_key("bio"));
        assert!(row["bio"].is_null());
        assert_eq!(row["blob"], serde_json::json!([1, 2, 255]));
    }

    #[test]
    fn json_encode_accepts_binary_strings() {
        let script = r#"
            function onRecord(r)
                return json.encode({ id = r.row.id, blob = r.row.blob, tags = { "a", "b" } })
            end
        "#;
        let context = ScriptContext::load(script, "flow").unwrap();
        let record = sample().with_column("blob", Value::Bytes(vec![b'o', b'k', 0xff]));

        let messages = context.on_record(&record).unwrap();
        let body: serde_json::Value =
            serde_json::from_slice(messages[0].value.as_deref().unwrap()).unwrap();
        assert_eq!(body["id"], 1);
        assert!(body["blob"].as_str().unwrap().starts_with("ok"));
        assert_eq!(body["tags"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn missing_entrypoint_fails_load() {
        let err = ScriptContext::load("function other() end", "flow")
            .err()
            .unwrap();
        assert_eq!(err, ScriptError::MissingEntrypoint("nil".into()));

        let err = ScriptContext::load("onRecord = 5", "flow").err().unwrap();
        assert_eq!(err, ScriptError::MissingEntrypoint("integer".into()));
    }

    #[test]
    fn syntax_error_fails_load() {
        assert!(matches!(
            ScriptContext::load("function onRecord(", "flow"),
            Err(ScriptError::Load(_))
        ));
    }

    #[test]
    fn runtime_error_is_reported() {
        let context =
            ScriptContext::load(r#"function onRecord(r) error("nope") end"#, "flow").unwrap();
        assert!(matches!(
            context.on_record(&sample()),
            Err(ScriptError::Runtime(msg)) if msg.contains("nope")
        ));
    }

    #[test]
    fn script_state_persists_between_records() {
        let script = r#"
            local seen = 0
            function onRecord(r)
                seen = seen + 1
                return { value = json.encode({ n = seen, id = r.row.id }), key = tostring(r.row.id) }
            end
        "#;
        let context = ScriptContext::load(script, "flow").unwrap();
        context.on_record(&sample()).unwrap();
        let second = context.on_record(&sample()).unwrap().remove(0);

        let body: serde_json::Value =
            serde_json::from_slice(second.value.as_deref().unwrap()).unwrap();
        assert_eq!(body["n"], 2);
        assert_eq!(second.key.as_deref(), Some(b"1".as_slice()));
    }

    #[test]
    fn json_decode_is_available() {
        let script = r#"
            function onRecord(r)
                local doc = json.decode('{"topic":"from_json","skip":null}')
                return { value = "x", topic = doc.topic }
            end
        "#;
        let context = ScriptContext::load(script, "flow").unwrap();
        assert_eq!(context.on_record(&sample()).unwrap()[0].topic, "from_json");
    }

    #[traced_test]
    #[test]
    fn print_goes_to_log() {
        let context = ScriptContext::load(
            r#"function onRecord(r) print("saw", r.checkpoint_id) end"#,
            "flow",
        )
        .unwrap();
        assert!(context.on_record(&sample()).unwrap().is_empty());
        assert!(logs_contain("saw\t10"));
    }
}
