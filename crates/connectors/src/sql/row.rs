use chrono::{DateTime, Utc};
use model::{core::value::Value, records::row::Row};
use mysql_async::Row as MySqlRow;
use mysql_async::prelude::FromValue;
use tokio_postgres::Row as PgRow;

/// One result-set column's name and raw driver type name, captured at
/// `memory-select` time (§4.7) so `MemoryDataset::resolve_column_types`
/// has a DB-type hint to prefer over observed-value inference.
#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub name: String,
    pub hint: String,
}

pub fn postgres_rows_with_meta(rows: &[PgRow]) -> (Vec<ColumnMeta>, Vec<Row>) {
    let meta = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| ColumnMeta {
                    name: c.name().to_string(),
                    hint: c.type_().name().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    let data = rows.iter().map(postgres_row_to_row).collect();
    (meta, data)
}

pub fn mysql_rows_with_meta(rows: &[MySqlRow]) -> (Vec<ColumnMeta>, Vec<Row>) {
    let meta = rows
        .first()
        .map(|row| {
            row.columns_ref()
                .iter()
                .map(|c| ColumnMeta {
                    name: c.name_str().into_owned(),
                    hint: mysql_column_type_name(c.column_type()).to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    let data = rows.iter().map(mysql_row_to_row).collect();
    (meta, data)
}

/// Maps a MySQL wire type to a SQL-keyword-ish name so it feeds the same
/// substring heuristics as `DataType::from_hint` (which was written
/// against names like Postgres's `int4`/`timestamptz`).
fn mysql_column_type_name(ct: mysql_async::consts::ColumnType) -> &'static str {
    use mysql_async::consts::ColumnType::*;
    match ct {
        MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_LONG | MYSQL_TYPE_LONGLONG
        | MYSQL_TYPE_INT24 | MYSQL_TYPE_YEAR => "INT",
        MYSQL_TYPE_FLOAT | MYSQL_TYPE_DOUBLE | MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => {
            "DOUBLE"
        }
        MYSQL_TYPE_BIT => "BOOLEAN",
        MYSQL_TYPE_DATE | MYSQL_TYPE_DATETIME | MYSQL_TYPE_TIMESTAMP | MYSQL_TYPE_NEWDATE
        | MYSQL_TYPE_TIME => "DATETIME",
        MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB
        | MYSQL_TYPE_BLOB => "BLOB",
        _ => "TEXT",
    }
}

/// Converts one driver row into the engine's column-name-keyed `Row`,
/// coercing every column into a `Value` variant. Unknown/unsupported
/// driver types fall back to a `Value::String` of their text
/// representation rather than being dropped, so memory-select and copy
/// jobs never silently lose a column.
pub fn postgres_row_to_row(row: &PgRow) -> Row {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let value = postgres_value(row, idx, column.type_());
        out.insert(name, value);
    }
    out
}

fn postgres_value(row: &PgRow, idx: usize, ty: &tokio_postgres::types::Type) -> Value {
    use tokio_postgres::types::Type;

    match *ty {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map(Value::Boolean)
            .unwrap_or(Value::Null),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .ok()
            .flatten()
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        Type::TIMESTAMP | Type::DATE => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .ok()
            .flatten()
            .map(|naive| Value::Timestamp(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)))
            .unwrap_or_else(|| {
                row.try_get::<_, Option<String>>(idx)
                    .ok()
                    .flatten()
                    .map(Value::String)
                    .unwrap_or(Value::Null)
            }),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

pub fn mysql_row_to_row(row: &MySqlRow) -> Row {
    let mut out = Row::new();
    let columns = row.columns_ref().to_vec();
    for (idx, column) in columns.iter().enumerate() {
        let name = column.name_str().into_owned();
        let value = mysql_value(row, idx);
        out.insert(name, value);
    }
    out
}

fn mysql_value(row: &MySqlRow, idx: usize) -> Value {
    match row.as_ref(idx) {
        None | Some(mysql_async::Value::NULL) => Value::Null,
        Some(mysql_async::Value::Int(v)) => Value::Int(*v),
        Some(mysql_async::Value::UInt(v)) => Value::Int(*v as i64),
        Some(mysql_async::Value::Float(v)) => Value::Float(*v as f64),
        Some(mysql_async::Value::Double(v)) => Value::Float(*v),
        Some(mysql_async::Value::Bytes(b)) => match String::from_utf8(b.clone()) {
            Ok(s) => Value::String(s),
            Err(_) => Value::Bytes(b.clone()),
        },
        Some(raw @ mysql_async::Value::Date(..)) => {
            match chrono::NaiveDateTime::from_value_opt(raw.clone()) {
                Ok(naive) => {
                    Value::Timestamp(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
                }
                Err(_) => Value::Null,
            }
        }
        Some(other) => Value::String(format!("{other:?}")),
    }
}
