//! C7 Memory-Select job: stages reference data into C3 (the in-memory
//! dataset store) for later `Map[...]` use. Always executes against the
//! destination pool (§4.7) — these datasets pre-stage data already
//! landed by earlier jobs in the same run.

use engine_core::cancellation::CancelToken;
use connectors::sql::ColumnMeta;
use model::core::data_type::DataType;
use model::core::value::Value;
use model::dataset::MemoryDataset;
use model::execution::job::Job;
use model::records::row::Row;
use planner::rewriter::extract_map_directives;

use engine_runtime::RunContext;

use crate::error::ProcessingError;
use crate::materialize::materialize_directives;

pub async fn run(ctx: &RunContext, job: &Job, cancel: CancelToken) -> Result<(), ProcessingError> {
    if cancel.is_cancelled() {
        return Err(ProcessingError::Cancelled(job.job_id.to_string()));
    }
    if job.columns.is_empty() {
        return Err(ProcessingError::EmptyColumns(job.job_id.to_string()));
    }

    let raw_sql = job
        .select_sql
        .as_deref()
        .ok_or_else(|| ProcessingError::MissingSelect(job.job_id.to_string()))?;
    let substituted = ctx.variables.substitute(raw_sql);
    let (statement, directives) = extract_map_directives(&substituted)?;

    let mut conn = ctx.destination_pool.acquire().await?;

    let (meta, rows) = if directives.is_empty() {
        conn.query_rows_with_meta(&statement).await?
    } else {
        let mut tx = conn.begin().await?;
        materialize_directives(&mut tx, ctx.destination_dialect.as_ref(), &ctx.memory_store, &directives).await?;
        let result = tx.query_rows_with_meta(&statement).await?;
        tx.commit().await?;
        result
    };

    let (columns, hints, projected_rows) = project(&job.columns, &meta, rows);
    let dataset = MemoryDataset::new(columns, hints, projected_rows);
    ctx.memory_store.put(&job.name, dataset).await?;
    Ok(())
}

/// Projects scanned rows onto the job's declared `columns`, preserving
/// their order, matching result-set column names case-insensitively
/// with whitespace/quotes stripped, and coercing each value by its
/// captured DB-type hint (§4.7).
fn project(
    wanted: &[String],
    meta: &[ColumnMeta],
    rows: Vec<Row>,
) -> (Vec<String>, Vec<Option<DataType>>, Vec<Row>) {
    let hints: Vec<Option<DataType>> = wanted
        .iter()
        .map(|w| {
            meta.iter()
                .find(|m| {
                    MemoryDataset::normalize_column_name(&m.name)
                        == MemoryDataset::normalize_column_name(w)
                })
                .map(|m| DataType::from_hint(&m.hint))
        })
        .collect();

    let projected_rows = rows
        .into_iter()
        .map(|row| {
            let mut out = Row::new();
            for (column, hint) in wanted.iter().zip(hints.iter()) {
                let value = MemoryDataset::value_for(&row, column)
                    .map(|v| coerce_by_hint(v, *hint))
                    .unwrap_or(Value::Null);
                out.insert(column.clone(), value);
            }
            out
        })
        .collect();

    (wanted.to_vec(), hints, projected_rows)
}

/// Converts a raw scanned value (often a driver-default `String`) into
/// the hinted storage type (§4.7's "converts scanned byte slices by
/// type"); falls back to the value as-scanned when the hint doesn't
/// apply or the coercion fails.
fn coerce_by_hint(value: &Value, hint: Option<DataType>) -> Value {
    match hint {
        Some(DataType::Int) => value.as_i64().map(Value::Int).unwrap_or_else(|| value.clone()),
        Some(DataType::Float) => value.as_f64().map(Value::Float).unwrap_or_else(|| value.clone()),
        Some(DataType::Boolean) => value
            .as_bool()
            .map(Value::Boolean)
            .unwrap_or_else(|| value.clone()),
        _ => value.clone(),
    }
}
