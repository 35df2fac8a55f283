use serde::{Deserialize, Serialize};
use std::fmt;

/// The storage type a temp-column materialized from a memory dataset is
/// given. Either captured directly from the source driver's result-set
/// metadata at dataset-creation time, or inferred by scanning observed
/// `Value::observed_kind()`s across all rows of a column (C1 "Type
/// inference for temp columns").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataType {
    Int,
    Float,
    Boolean,
    String,
    Bytes,
    Timestamp,
}

impl DataType {
    /// Maps a driver-reported type name (as captured from result-set
    /// metadata) onto one of the concrete storage kinds above. Falls back
    /// to `String` for anything unrecognized, mirroring the connectors
    /// crate's own "unknown column type -> String" fallback.
    pub fn from_hint(hint: &str) -> DataType {
        let upper = hint.to_ascii_uppercase();
        match upper.as_str() {
            s if s.contains("INT") || s.contains("SERIAL") => DataType::Int,
            s if s.contains("FLOAT")
                || s.contains("DOUBLE")
                || s.contains("DECIMAL")
                || s.contains("NUMERIC")
                || s.contains("REAL") =>
            {
                DataType::Float
            }
            s if s.contains("BOOL") || s.contains("BIT") => DataType::Boolean,
            s if s.contains("TIMESTAMP") || s.contains("DATE") || s.contains("TIME") => {
                DataType::Timestamp
            }
            s if s.contains("BYTEA")
                || s.contains("BLOB")
                || s.contains("BINARY")
                || s.contains("BYTES") =>
            {
                DataType::Bytes
            }
            _ => DataType::String,
        }
    }

    /// Maps an observed `Value` kind (as produced by `Value::observed_kind`)
    /// back onto a storage type, used when no driver hint was captured.
    pub fn from_observed_kind(kind: &str) -> Option<DataType> {
        match kind {
            "int" => Some(DataType::Int),
            "float" => Some(DataType::Float),
            "bool" => Some(DataType::Boolean),
            "string" => Some(DataType::String),
            "time" => Some(DataType::Timestamp),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Int => "INT",
            DataType::Float => "FLOAT",
            DataType::Boolean => "BOOLEAN",
            DataType::String => "STRING",
            DataType::Bytes => "BYTES",
            DataType::Timestamp => "TIMESTAMP",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_hint_falls_back_to_string() {
        assert_eq!(DataType::from_hint("GEOMETRY"), DataType::String);
    }

    #[test]
    fn numeric_hints_map_to_int_or_float() {
        assert_eq!(DataType::from_hint("BIGINT"), DataType::Int);
        assert_eq!(DataType::from_hint("NUMERIC(10,2)"), DataType::Float);
    }
}
