use crate::core::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single scanned row: a mapping from column name to value, as named in
/// the design notes ("Dynamic row values"). Column names are matched
/// case-sensitively here; callers that need case/quote-insensitive lookup
/// (memory-select's column projection) normalize before inserting.
pub type Row = HashMap<String, Value>;

/// An ordered batch of rows flowing through a reader -> writer channel.
/// Bounded to at most `records_per_page` rows per the copy job contract.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RowBatch {
    pub rows: Vec<Row>,
}

impl RowBatch {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
