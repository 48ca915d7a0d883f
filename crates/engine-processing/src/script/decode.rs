use crate::error::DecodeError;
use mlua::{MultiValue, Table, Value as LuaValue};
use model::records::message::{MessageHeader, OutboundMessage};

/// Decodes everything `onRecord` returned. Each value is decoded on its own;
/// `nil` values are dropped.
pub fn decode_returns(
    values: MultiValue,
    destination: &str,
) -> Result<Vec<OutboundMessage>, DecodeError> {
    let mut messages = Vec::with_capacity(values.len());
    for value in values {
        if let Some(message) = decode_value(value, destination)? {
            messages.push(message);
        }
    }
    Ok(messages)
}

/// A string is the message value, a table spells out the message, `nil` is
/// nothing. Topics left empty fall back to `destination`.
pub fn decode_value(
    value: LuaValue,
    destination: &str,
) -> Result<Option<OutboundMessage>, DecodeError> {
    match value {
        LuaValue::Nil => Ok(None),
        LuaValue::String(s) => Ok(Some(OutboundMessage::text(
            s.as_bytes().to_vec(),
            destination,
        ))),
        LuaValue::Table(table) => decode_table(&table, destination).map(Some),
        other => Err(DecodeError::InvalidReturn(other.type_name().to_string())),
    }
}

fn decode_table(table: &Table, destination: &str) -> Result<OutboundMessage, DecodeError> {
    let key = bytes_or_nil(field(table, "key")?).map_err(DecodeError::InvalidKey)?;
    let value = bytes_or_nil(field(table, "value")?).map_err(DecodeError::InvalidValue)?;

    let topic = match field(table, "topic")? {
        LuaValue::Nil => None,
        LuaValue::String(s) => Some(
            s.to_str()
                .map_err(|e| DecodeError::InvalidTopic(e.to_string()))?
                .to_string(),
        ),
        other => {
            return Err(DecodeError::InvalidTopic(format!(
                "expected string or nil, got {}",
                other.type_name()
            )));
        }
    };

    Ok(OutboundMessage {
        key,
        value,
        topic: topic
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| destination.to_string()),
        partition: partition(field(table, "partition")?)?,
        headers: headers(field(table, "headers")?)?,
    })
}

fn field(table: &Table, name: &str) -> Result<LuaValue, DecodeError> {
    table
        .get::<LuaValue>(name)
        .map_err(|e| DecodeError::Lua(e.to_string()))
}

fn bytes_or_nil(value: LuaValue) -> Result<Option<Vec<u8>>, String> {
    match value {
        LuaValue::Nil => Ok(None),
        LuaValue::String(s) => Ok(Some(s.as_bytes().to_vec())),
        other => Err(format!("expected string or nil, got {}", other.type_name())),
    }
}

fn partition(value: LuaValue) -> Result<i32, DecodeError> {
    let number = match value {
        LuaValue::Nil => return Ok(0),
        LuaValue::Integer(n) => n,
        LuaValue::Number(n) if n.fract() == 0.0 => n as i64,
        LuaValue::String(s) => s
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| DecodeError::InvalidPartition("not an integer".into()))?,
        other => {
            return Err(DecodeError::InvalidPartition(format!(
                "expected integer, got {}",
                other.type_name()
            )));
        }
    };
    i32::try_from(number)
        .map_err(|_| DecodeError::InvalidPartition(format!("{number} out of range")))
}

/// Headers come back sorted by key so output does not depend on Lua's table
/// iteration order.
fn headers(value: LuaValue) -> Result<Vec<MessageHeader>, DecodeError> {
    let table = match value {
        LuaValue::Nil | LuaValue::Boolean(false) => return Ok(Vec::new()),
        LuaValue::Table(table) => table,
        other => return Err(DecodeError::InvalidHeaders(other.type_name().to_string())),
    };

    let mut headers = Vec::new();
    for pair in table.pairs::<LuaValue, LuaValue>() {
        let (k, v) = pair.map_err(|e| DecodeError::Lua(e.to_string()))?;
        let key = match k {
            LuaValue::String(s) => s.to_string_lossy().to_string(),
            LuaValue::Integer(n) => n.to_string(),
            other => {
                return Err(DecodeError::InvalidHeaders(format!(
                    "header names must be strings, got {}",
                    other.type_name()
                )));
            }
        };
        let value = match v {
            LuaValue::String(s) => s.as_bytes().to_vec(),
            other => {
                return Err(DecodeError::InvalidHeader {
                    key,
                    message: format!("expected string, got {}", other.type_name()),
                });
            }
        };
        headers.push(MessageHeader { key, value });
    }
    headers.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    fn eval(lua: &Lua, chunk: &str) -> MultiValue {
        lua.load(chunk).eval::<MultiValue>().unwrap()
    }

    #[test]
    fn string_becomes_value_on_destination() {
        let lua = Lua::new();
        let messages = decode_returns(eval(&lua, r#"return "hello""#), "users").unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].value.as_deref(), Some(b"hello".as_slice()));
        assert_eq!(messages[0].key, None);
        assert_eq!(messages[0].topic, "users");
        assert_eq!(messages[0].partition, 0);
    }

    #[test]
    fn table_fields_are_honoured() {
        let lua = Lua::new();
        let returned = eval(
            &lua,
            r#"return { key = "k", value = "v", topic = "custom", partition = 2,
                        headers = { h = "v", a = "1" } }"#,
        );
        let message = decode_returns(returned, "users").unwrap().remove(0);

        assert_eq!(message.key.as_deref(), Some(b"k".as_slice()));
        assert_eq!(message.topic, "custom");
        assert_eq!(message.partition, 2);
        let keys: Vec<_> = message.headers.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "h"]);
        assert_eq!(message.header("h"), Some(b"v".as_slice()));
    }

    #[test]
    fn empty_topic_and_missing_fields_default() {
        let lua = Lua::new();
        let message = decode_returns(eval(&lua, r#"return { topic = "" }"#), "dest")
            .unwrap()
            .remove(0);

        assert_eq!(message.topic, "dest");
        assert_eq!(message.key, None);
        assert_eq!(message.value, None);
        assert!(message.headers.is_empty());
    }

    #[test]
    fn nils_are_dropped_between_values() {
        let lua = Lua::new();
        let messages = decode_returns(eval(&lua, r#"return nil, "a", nil, "b""#), "t").unwrap();
        let values: Vec<_> = messages.iter().map(|m| m.value.clone().unwrap()).collect();
        assert_eq!(values, vec![b"a".to_vec(), b"b".to_vec()]);

        assert!(decode_returns(eval(&lua, "return"), "t").unwrap().is_empty());
    }

    #[test]
    fn partition_accepts_numeric_forms() {
        let lua = Lua::new();
        for chunk in [
            "return { partition = 3 }",
            "return { partition = 3.0 }",
            r#"return { partition = "3" }"#,
        ] {
            let message = decode_returns(eval(&lua, chunk), "t").unwrap().remove(0);
            assert_eq!(message.partition, 3, "{chunk}");
        }
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        let lua = Lua::new();
        let cases = [
            ("return 42", DecodeError::InvalidReturn("integer".into())),
            ("return true", DecodeError::InvalidReturn("boolean".into())),
            (
                "return { key = {} }",
                DecodeError::InvalidKey("expected string or nil, got table".into()),
            ),
            (
                "return { topic = 1 }",
                DecodeError::InvalidTopic("expected string or nil, got integer".into()),
            ),
            (
                "return { headers = \"x\" }",
                DecodeError::InvalidHeaders("string".into()),
            ),
            (
                "return { headers = { h = 1 } }",
                DecodeError::InvalidHeader {
                    key: "h".into(),
                    message: "expected string, got integer".into(),
                },
            ),
            (
                "return { partition = 2.5 }",
                DecodeError::InvalidPartition("expected integer, got number".into()),
            ),
            (
                "return { partition = 4294967296 }",
                DecodeError::InvalidPartition("4294967296 out of range".into()),
            ),
        ];

        for (chunk, expected) in cases {
            assert_eq!(decode_returns(eval(&lua, chunk), "t").unwrap_err(), expected, "{chunk}");
        }
    }

    #[test]
    fn second_value_error_fails_whole_result() {
        let lua = Lua::new();
        assert!(decode_returns(eval(&lua, r#"return "ok", 1"#), "t").is_err());
    }
}
