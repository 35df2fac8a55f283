use crate::{core::data_type::DataType, core::value::Value, records::row::Row};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An in-memory dataset materialized by a `memory-select` job (§3
/// "Memory dataset"): an ordered column list, an optional DB-type hint per
/// column (captured from result-set metadata at dataset-creation time, per
/// C1), and the scanned rows. Write-once per key per run — enforced by the
/// store that owns it, not by this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDataset {
    pub columns: Vec<String>,
    pub column_hints: Vec<Option<DataType>>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeInferenceError {
    /// A column had no driver hint and its observed values span more than
    /// one `Value::observed_kind()`.
    MixedKinds { column: String },
    /// A column had no hint and every row's value was `NULL`, leaving
    /// nothing to infer a type from.
    NoObservations { column: String },
}

impl fmt::Display for TypeInferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeInferenceError::MixedKinds { column } => {
                write!(f, "column {column} has mixed value kinds")
            }
            TypeInferenceError::NoObservations { column } => {
                write!(f, "column {column} has no non-null values to infer a type from")
            }
        }
    }
}

impl std::error::Error for TypeInferenceError {}

impl MemoryDataset {
    pub fn new(columns: Vec<String>, column_hints: Vec<Option<DataType>>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            column_hints,
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_hint(&self, column: &str) -> Option<DataType> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|idx| self.column_hints.get(idx))
            .copied()
            .flatten()
    }

    /// C1 "Type inference for temp columns": for each column, a captured
    /// DB-type hint wins outright; otherwise every non-null value across
    /// all rows is inspected via `Value::observed_kind`, and a single
    /// consistent kind is required. Column order matches `self.columns`.
    pub fn resolve_column_types(&self) -> Result<Vec<DataType>, TypeInferenceError> {
        let mut resolved = Vec::with_capacity(self.columns.len());
        for (idx, column) in self.columns.iter().enumerate() {
            if let Some(hint) = self.column_hints.get(idx).copied().flatten() {
                resolved.push(hint);
                continue;
            }

            let mut observed: Option<&'static str> = None;
            for row in &self.rows {
                let Some(value) = row.get(column) else {
                    continue;
                };
                let Some(kind) = value.observed_kind() else {
                    continue;
                };
                match observed {
                    None => observed = Some(kind),
                    Some(existing) if existing == kind => {}
                    Some(_) => {
                        return Err(TypeInferenceError::MixedKinds {
                            column: column.clone(),
                        });
                    }
                }
            }

            match observed.and_then(DataType::from_observed_kind) {
                Some(dt) => resolved.push(dt),
                None => {
                    return Err(TypeInferenceError::NoObservations {
                        column: column.clone(),
                    });
                }
            }
        }
        Ok(resolved)
    }

    /// Column-name -> value lookup used when binding a row into a
    /// dialect-rendered `INSERT`/temp-table row, matched case-insensitively
    /// with whitespace/quotes stripped (§4.7's projection matching rule).
    pub fn value_for(row: &Row, column: &str) -> Option<&Value> {
        let normalized_target = normalize_for_match(column);
        row.iter()
            .find(|(name, _)| normalize_for_match(name) == normalized_target)
            .map(|(_, v)| v)
    }

    /// Public entry point for the same case/whitespace/quote-insensitive
    /// matching rule, used by `memory-select`'s column projection (§4.7)
    /// to line up the job's declared `columns` against scanned result-set
    /// column names.
    pub fn normalize_column_name(s: &str) -> String {
        normalize_for_match(s)
    }
}

fn normalize_for_match(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '"' && *c != '\'')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn hint_wins_over_observed_values() {
        let mut row = HashMap::new();
        row.insert("price".to_string(), Value::String("12.5".into()));
        let ds = MemoryDataset::new(
            vec!["price".into()],
            vec![Some(DataType::Float)],
            vec![row],
        );
        assert_eq!(ds.resolve_column_types().unwrap(), vec![DataType::Float]);
    }

    #[test]
    fn infers_from_observed_kind_when_no_hint() {
        let mut row = HashMap::new();
        row.insert("active".to_string(), Value::Boolean(true));
        let ds = MemoryDataset::new(vec!["active".into()], vec![None], vec![row]);
        assert_eq!(ds.resolve_column_types().unwrap(), vec![DataType::Boolean]);
    }

    #[test]
    fn rejects_mixed_observed_kinds() {
        let mut r1 = HashMap::new();
        r1.insert("v".to_string(), Value::Int(1));
        let mut r2 = HashMap::new();
        r2.insert("v".to_string(), Value::String("x".into()));
        let ds = MemoryDataset::new(vec!["v".into()], vec![None], vec![r1, r2]);
        assert!(matches!(
            ds.resolve_column_types(),
            Err(TypeInferenceError::MixedKinds { .. })
        ));
    }
}
