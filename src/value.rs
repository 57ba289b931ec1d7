//! Heterogeneous SQL scalar values.
//!
//! Column min/max bounds and functional-dependency sample-violation cells can
//! hold values of any SQL type. [`SqlValue`] is a small tagged union wide
//! enough to represent anything the profiler or FD discoverer observes,
//! independent of the wire format the underlying driver used.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// A single SQL scalar, tagged by its runtime shape.
///
/// Serializes to JSON in its natural form: numbers as JSON numbers, text as
/// JSON strings, timestamps as ISO-8601 strings, and binary data as
/// base64-encoded strings (JSON has no native byte-string type).
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Int(i) => write!(f, "{i}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(s) => write!(f, "{s}"),
            SqlValue::Bytes(b) => write!(f, "{}", STANDARD.encode(b)),
            SqlValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

impl Serialize for SqlValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            SqlValue::Null => serializer.serialize_none(),
            SqlValue::Int(i) => serializer.serialize_i64(*i),
            SqlValue::Float(v) => serializer.serialize_f64(*v),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Bytes(b) => serializer.serialize_str(&STANDARD.encode(b)),
            SqlValue::DateTime(dt) => {
                serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_serializes_to_json_null() {
        assert_eq!(serde_json::to_string(&SqlValue::Null).unwrap(), "null");
    }

    #[test]
    fn bytes_serialize_as_base64() {
        let v = SqlValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"3q2+7w==\"");
    }

    #[test]
    fn int_serializes_as_json_number() {
        assert_eq!(serde_json::to_string(&SqlValue::Int(42)).unwrap(), "42");
    }

    #[test]
    fn datetime_serializes_as_iso8601() {
        let dt = NaiveDateTime::parse_from_str("2024-01-02 03:04:05", "%Y-%m-%d %H:%M:%S").unwrap();
        let json = serde_json::to_string(&SqlValue::DateTime(dt)).unwrap();
        assert_eq!(json, "\"2024-01-02T03:04:05\"");
    }

    #[test]
    fn display_matches_serialized_text_for_text_variant() {
        let v = SqlValue::Text("hello".to_string());
        assert_eq!(v.to_string(), "hello");
    }
}
