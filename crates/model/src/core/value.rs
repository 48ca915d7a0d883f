use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single column value carried by an [`InputRecord`](crate::records::record::InputRecord).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Value {
    /// Best-effort typing of a raw text cell (CSV, query replication).
    /// Empty cells are treated as NULL.
    pub fn from_text(cell: &str) -> Self {
        if cell.is_empty() {
            return Value::Null;
        }
        if let Ok(v) = cell.parse::<i64>() {
            return Value::Int(v);
        }
        if let Ok(v) = cell.parse::<f64>() {
            return Value::Float(v);
        }
        match cell {
            "true" | "TRUE" => Value::Boolean(true),
            "false" | "FALSE" => Value::Boolean(false),
            _ => Value::String(cell.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::String(v) => v.parse::<i64>().ok(),
            Value::Boolean(v) => Some(i64::from(*v)),
            Value::Json(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::String(v) => Some(v.clone()),
            Value::Boolean(v) => Some(v.to_string()),
            Value::Timestamp(v) => Some(v.to_rfc3339()),
            Value::Json(v) => Some(v.to_string()),
            Value::Bytes(v) => Some(String::from_utf8_lossy(v).into_owned()),
            Value::Null => None,
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => std::mem::size_of::<bool>(),
            Value::Int(_) => std::mem::size_of::<i64>(),
            Value::Float(_) => std::mem::size_of::<f64>(),
            Value::String(s) => s.len(),
            Value::Bytes(b) => b.len(),
            Value::Timestamp(_) => std::mem::size_of::<DateTime<Utc>>(),
            Value::Json(v) => serde_json::to_string(v).map_or(0, |s| s.len()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            other => Value::Json(other),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Bytes(v) => serializer.serialize_bytes(v),
            Value::Timestamp(v) => serializer.serialize_str(&v.to_rfc3339()),
            Value::Json(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Json(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_cells_are_typed() {
        assert_eq!(Value::from_text(""), Value::Null);
        assert_eq!(Value::from_text("42"), Value::Int(42));
        assert_eq!(Value::from_text("1.5"), Value::Float(1.5));
        assert_eq!(Value::from_text("true"), Value::Boolean(true));
        assert_eq!(Value::from_text("abc"), Value::String("abc".into()));
    }

    #[test]
    fn json_numbers_keep_integer_precision() {
        let v: Value = serde_json::from_str("9007199254740993").unwrap();
        assert_eq!(v, Value::Int(9_007_199_254_740_993));

        let v: Value = serde_json::from_str(r#"{"a": [1, 2]}"#).unwrap();
        assert!(matches!(v, Value::Json(_)));
    }
}
