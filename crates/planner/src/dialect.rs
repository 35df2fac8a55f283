//! C1 SQL Dialect: the capability set a destination/source database
//! exposes to the executors — total-count, hash-partitioned SELECT,
//! EXPLAIN-driven main-table discovery, batched multi-row INSERT
//! rendering, and temp-table DDL/DML for Map materialization.

use connectors::sql::{DialectKind, MainTable};
use model::{
    core::data_type::DataType,
    dataset::MemoryDataset,
    execution::job::Job,
    records::row::Row,
};

use crate::error::PlannerError;

/// Object-safe capability set selected by the project's configured
/// dialect identifier at run start (§9 "Interface polymorphism").
pub trait Dialect: Send + Sync {
    fn kind(&self) -> DialectKind;

    /// `SELECT COUNT(*) FROM (job.select_sql) AS t`.
    fn total_count_sql(&self, select_sql: &str) -> String {
        format!("SELECT COUNT(*) FROM ({select_sql}) AS t")
    }

    /// EXPLAIN in a form the connectors crate's explain parser can read
    /// the outermost scanned relation from.
    fn explain_sql(&self, select_sql: &str) -> String;

    /// The canonical copy-job partitioning predicate: assigns every row
    /// to exactly one of `worker_count` readers via a stable per-row hash,
    /// appended as `AND (...)` when the query already has a top-level
    /// WHERE, else as `WHERE (...)`.
    fn select_by_hash_sql(
        &self,
        job: &Job,
        clean_select: &str,
        has_where: bool,
        worker_index: u32,
        worker_count: u32,
        main_table: &MainTable,
    ) -> Result<String, PlannerError>;

    /// A single multi-VALUES INSERT using the job's declared column
    /// order, with literals escaped inline (via `Value`'s `Display`), and
    /// `post_insert_sql` appended after a separating `;` when present.
    fn build_insert(&self, job: &Job, rows: &[Row]) -> Result<String, PlannerError> {
        if job.columns.is_empty() {
            return Err(PlannerError::NoColumns(job.job_id.to_string()));
        }
        let insert_sql = job
            .insert_sql
            .as_deref()
            .unwrap_or("INSERT INTO t")
            .trim_end_matches(';')
            .trim_end();

        let mut sql = String::from(insert_sql);
        sql.push_str(" VALUES ");
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for (j, column) in job.columns.iter().enumerate() {
                if j > 0 {
                    sql.push_str(", ");
                }
                match MemoryDataset::value_for(row, column) {
                    Some(value) => sql.push_str(&value.to_string()),
                    None => sql.push_str("NULL"),
                }
            }
            sql.push(')');
        }

        if let Some(post) = job.post_insert_sql.as_deref().filter(|s| !s.trim().is_empty()) {
            sql.push_str("; ");
            sql.push_str(post.trim().trim_end_matches(';'));
        }

        Ok(sql)
    }

    /// Session-scoped temp-table DDL for a Map directive's dataset,
    /// dropped automatically where the dialect supports it.
    fn create_temp_table_sql(&self, key: &str, dataset: &MemoryDataset) -> Result<String, PlannerError>;

    /// A single prepared-row insert into a temp table created by
    /// `create_temp_table_sql`.
    fn insert_temp_row_sql(&self, key: &str, dataset: &MemoryDataset, row: &Row) -> String {
        let mut sql = format!("INSERT INTO {key} (");
        sql.push_str(&dataset.columns.join(", "));
        sql.push_str(") VALUES (");
        for (i, column) in dataset.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            match MemoryDataset::value_for(row, column) {
                Some(value) => sql.push_str(&value.to_string()),
                None => sql.push_str("NULL"),
            }
        }
        sql.push(')');
        sql
    }

    /// Maps a resolved storage `DataType` onto this dialect's column type
    /// keyword, used when rendering `create_temp_table_sql`.
    fn column_type_keyword(&self, dt: DataType) -> &'static str;
}

pub struct Postgres;

impl Dialect for Postgres {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn explain_sql(&self, select_sql: &str) -> String {
        format!("EXPLAIN {select_sql}")
    }

    fn select_by_hash_sql(
        &self,
        _job: &Job,
        clean_select: &str,
        has_where: bool,
        worker_index: u32,
        worker_count: u32,
        main_table: &MainTable,
    ) -> Result<String, PlannerError> {
        let reference = main_table.reference();
        let predicate = format!(
            "abs(mod(hashtextextended({reference}.ctid::text, 0), {worker_count})) = {worker_index}"
        );
        Ok(append_predicate(clean_select, has_where, &predicate))
    }

    fn create_temp_table_sql(&self, key: &str, dataset: &MemoryDataset) -> Result<String, PlannerError> {
        let types = dataset.resolve_column_types()?;
        let cols = render_columns(self, &dataset.columns, &types);
        Ok(format!("CREATE TEMP TABLE {key} ({cols}) ON COMMIT DROP"))
    }

    fn column_type_keyword(&self, dt: DataType) -> &'static str {
        match dt {
            DataType::Int => "BIGINT",
            DataType::Float => "DOUBLE PRECISION",
            DataType::Boolean => "BOOLEAN",
            DataType::String => "TEXT",
            DataType::Bytes => "BYTEA",
            DataType::Timestamp => "TIMESTAMPTZ",
        }
    }
}

pub struct MySql;

impl Dialect for MySql {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn explain_sql(&self, select_sql: &str) -> String {
        format!("EXPLAIN {select_sql}")
    }

    /// MySQL exposes no stable per-row physical locator comparable to
    /// `ctid`, so the `main_table` EXPLAIN result is unused here and the
    /// partition is driven by a declared primary-key column instead — the
    /// option-(b) fallback named in §9's portability boundary.
    fn select_by_hash_sql(
        &self,
        job: &Job,
        clean_select: &str,
        has_where: bool,
        worker_index: u32,
        worker_count: u32,
        _main_table: &MainTable,
    ) -> Result<String, PlannerError> {
        let pk = job.primary_keys.first().ok_or_else(|| PlannerError::NoPartitionKey {
            dialect: "mysql".to_string(),
        })?;
        let predicate = format!("MOD(ABS(CRC32({pk})), {worker_count}) = {worker_index}");
        Ok(append_predicate(clean_select, has_where, &predicate))
    }

    fn create_temp_table_sql(&self, key: &str, dataset: &MemoryDataset) -> Result<String, PlannerError> {
        let types = dataset.resolve_column_types()?;
        let cols = render_columns(self, &dataset.columns, &types);
        Ok(format!("CREATE TEMPORARY TABLE {key} ({cols})"))
    }

    fn column_type_keyword(&self, dt: DataType) -> &'static str {
        match dt {
            DataType::Int => "BIGINT",
            DataType::Float => "DOUBLE",
            DataType::Boolean => "TINYINT(1)",
            DataType::String => "TEXT",
            DataType::Bytes => "BLOB",
            DataType::Timestamp => "DATETIME",
        }
    }
}

/// `SqlServer`/`Access` ship only the primary-key-modulo fallback
/// partitioning (§9): no EXPLAIN-based `ctid`-equivalent is implemented
/// for either, a declared portability boundary rather than a silent gap.
pub struct SqlServer;

impl Dialect for SqlServer {
    fn kind(&self) -> DialectKind {
        DialectKind::SqlServer
    }

    fn explain_sql(&self, select_sql: &str) -> String {
        format!("SET SHOWPLAN_TEXT ON; {select_sql}")
    }

    fn select_by_hash_sql(
        &self,
        job: &Job,
        clean_select: &str,
        has_where: bool,
        worker_index: u32,
        worker_count: u32,
        _main_table: &MainTable,
    ) -> Result<String, PlannerError> {
        let pk = job.primary_keys.first().ok_or_else(|| PlannerError::NoPartitionKey {
            dialect: "sqlserver".to_string(),
        })?;
        let predicate =
            format!("ABS(CHECKSUM({pk})) % {worker_count} = {worker_index}");
        Ok(append_predicate(clean_select, has_where, &predicate))
    }

    fn create_temp_table_sql(&self, key: &str, dataset: &MemoryDataset) -> Result<String, PlannerError> {
        let types = dataset.resolve_column_types()?;
        let cols = render_columns(self, &dataset.columns, &types);
        Ok(format!("CREATE TABLE #{key} ({cols})"))
    }

    fn column_type_keyword(&self, dt: DataType) -> &'static str {
        match dt {
            DataType::Int => "BIGINT",
            DataType::Float => "FLOAT",
            DataType::Boolean => "BIT",
            DataType::String => "NVARCHAR(MAX)",
            DataType::Bytes => "VARBINARY(MAX)",
            DataType::Timestamp => "DATETIME2",
        }
    }
}

pub struct Access;

impl Dialect for Access {
    fn kind(&self) -> DialectKind {
        DialectKind::Access
    }

    fn explain_sql(&self, select_sql: &str) -> String {
        select_sql.to_string()
    }

    fn select_by_hash_sql(
        &self,
        job: &Job,
        clean_select: &str,
        has_where: bool,
        worker_index: u32,
        worker_count: u32,
        _main_table: &MainTable,
    ) -> Result<String, PlannerError> {
        let pk = job.primary_keys.first().ok_or_else(|| PlannerError::NoPartitionKey {
            dialect: "access".to_string(),
        })?;
        let predicate = format!("({pk} MOD {worker_count}) = {worker_index}");
        Ok(append_predicate(clean_select, has_where, &predicate))
    }

    fn create_temp_table_sql(&self, _key: &str, _dataset: &MemoryDataset) -> Result<String, PlannerError> {
        // Access has no session-scoped temp table facility; Map
        // directives are unsupported on this dialect.
        Err(PlannerError::NoPartitionKey {
            dialect: "access".to_string(),
        })
    }

    fn column_type_keyword(&self, dt: DataType) -> &'static str {
        match dt {
            DataType::Int => "LONG",
            DataType::Float => "DOUBLE",
            DataType::Boolean => "YESNO",
            DataType::String => "LONGTEXT",
            DataType::Bytes => "LONGBINARY",
            DataType::Timestamp => "DATETIME",
        }
    }
}

fn append_predicate(clean_select: &str, has_where: bool, predicate: &str) -> String {
    let trimmed = clean_select.trim_end().trim_end_matches(';');
    if has_where {
        format!("{trimmed} AND ({predicate})")
    } else {
        format!("{trimmed} WHERE ({predicate})")
    }
}

fn render_columns(dialect: &dyn Dialect, columns: &[String], types: &[DataType]) -> String {
    columns
        .iter()
        .zip(types.iter())
        .map(|(name, dt)| format!("{name} {}", dialect.column_type_keyword(*dt)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolves the configured dialect identifier (§6) to a concrete `Dialect`
/// implementation.
pub fn for_kind(kind: DialectKind) -> Box<dyn Dialect> {
    match kind {
        DialectKind::Postgres => Box::new(Postgres),
        DialectKind::MySql => Box::new(MySql),
        DialectKind::SqlServer => Box::new(SqlServer),
        DialectKind::Access => Box::new(Access),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;
    use model::execution::job::{JobConnection, JobKind};
    use std::collections::HashMap;

    fn job() -> Job {
        Job {
            job_id: "j1".into(),
            name: "copy".into(),
            kind: JobKind::Insert,
            select_sql: Some("SELECT a, b FROM src".into()),
            insert_sql: Some("INSERT INTO dst (a, b)".into()),
            post_insert_sql: None,
            columns: vec!["a".into(), "b".into()],
            primary_keys: vec!["id".into()],
            records_per_page: 100,
            stop_on_error: false,
            connection: JobConnection::Destination,
        }
    }

    fn main_table() -> MainTable {
        MainTable {
            schema: None,
            name: "src".into(),
            alias: None,
        }
    }

    #[test]
    fn postgres_hash_predicate_uses_where_when_absent() {
        let d = Postgres;
        let sql = d
            .select_by_hash_sql(&job(), "SELECT a, b FROM src", false, 1, 4, &main_table())
            .unwrap();
        assert!(sql.contains("WHERE ("));
        assert!(sql.contains("hashtextextended(src.ctid::text, 0), 4)) = 1"));
    }

    #[test]
    fn postgres_hash_predicate_appends_and_when_where_present() {
        let d = Postgres;
        let sql = d
            .select_by_hash_sql(
                &job(),
                "SELECT a, b FROM src WHERE a > 1",
                true,
                0,
                2,
                &main_table(),
            )
            .unwrap();
        assert!(sql.contains("WHERE a > 1 AND ("));
    }

    #[test]
    fn mysql_falls_back_to_primary_key_modulo() {
        let d = MySql;
        let sql = d
            .select_by_hash_sql(&job(), "SELECT a, b FROM src", false, 0, 2, &main_table())
            .unwrap();
        assert!(sql.contains("CRC32(id)"));
    }

    #[test]
    fn mysql_without_primary_key_is_an_error() {
        let d = MySql;
        let mut j = job();
        j.primary_keys.clear();
        let err = d
            .select_by_hash_sql(&j, "SELECT a, b FROM src", false, 0, 2, &main_table())
            .unwrap_err();
        assert!(matches!(err, PlannerError::NoPartitionKey { .. }));
    }

    #[test]
    fn build_insert_renders_multi_values_and_post_sql() {
        let d = Postgres;
        let mut j = job();
        j.post_insert_sql = Some("UPDATE dst SET touched = TRUE".into());
        let mut row = HashMap::new();
        row.insert("a".to_string(), Value::Int(1));
        row.insert("b".to_string(), Value::String("x".into()));
        let sql = d.build_insert(&j, &[row]).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO dst (a, b) VALUES (1, 'x'); UPDATE dst SET touched = TRUE"
        );
    }

    #[test]
    fn create_temp_table_renders_inferred_types() {
        let d = Postgres;
        let mut row = HashMap::new();
        row.insert("sku".to_string(), Value::String("abc".into()));
        row.insert("price".to_string(), Value::Float(1.5));
        let ds = MemoryDataset::new(
            vec!["sku".into(), "price".into()],
            vec![None, None],
            vec![row],
        );
        let sql = d.create_temp_table_sql("cadastro", &ds).unwrap();
        assert_eq!(
            sql,
            "CREATE TEMP TABLE cadastro (sku TEXT, price DOUBLE PRECISION) ON COMMIT DROP"
        );
    }
}
