use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single scanned or bound value.
///
/// This is the "dynamic row value" container named in the design notes:
/// rows carry heterogeneous values, and every driver-specific scan result
/// is coerced into one of these variants before it leaves the connectors
/// crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Boolean(v) => Some(*v as i64),
            Value::String(v) => v.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::String(v) => v.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::String(v) => match v.to_ascii_lowercase().as_str() {
                "t" | "true" | "1" | "y" | "yes" => Some(true),
                "f" | "false" | "0" | "n" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Go-style "observed kind" used by temp-column type inference (C1):
    /// int / float / bool / string / time, collapsing `Null` (absent from
    /// the comparison since nulls never constrain the inferred kind).
    pub fn observed_kind(&self) -> Option<&'static str> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some("int"),
            Value::Float(_) => Some("float"),
            Value::Boolean(_) => Some("bool"),
            Value::String(_) => Some("string"),
            Value::Bytes(_) => Some("string"),
            Value::Timestamp(_) => Some("time"),
        }
    }

    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.partial_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Renders the value as a SQL literal, per C1's `build_insert` escaping
/// rules: strings are single-quoted with `''` doubling, bytes are
/// rendered as an escaped string, booleans as `TRUE`/`FALSE`, numbers
/// directly, timestamps as UTC ISO-8601, and missing/`Null` as `NULL`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
            Value::String(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Value::Bytes(v) => {
                let as_str = String::from_utf8_lossy(v);
                write!(f, "'{}'", as_str.replace('\'', "''"))
            }
            Value::Timestamp(v) => write!(f, "'{}'", v.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_literal_doubles_quotes() {
        let v = Value::String("it's".into());
        assert_eq!(v.to_string(), "'it''s'");
    }

    #[test]
    fn boolean_literal_is_upper_keyword() {
        assert_eq!(Value::Boolean(true).to_string(), "TRUE");
        assert_eq!(Value::Boolean(false).to_string(), "FALSE");
    }

    #[test]
    fn null_renders_as_null_keyword() {
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
