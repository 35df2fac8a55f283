//! C7 Condition job: always evaluated against the source, scanning a
//! single boolean scalar (§4.7). `false` or a non-boolean result fails
//! the job; Map directives are honored through a source transaction
//! that is rolled back afterward since a condition never writes.

use engine_core::cancellation::CancelToken;
use model::execution::job::Job;
use planner::rewriter::extract_map_directives;

use engine_runtime::RunContext;

use crate::error::ProcessingError;
use crate::materialize::materialize_directives;

pub async fn run(ctx: &RunContext, job: &Job, cancel: CancelToken) -> Result<(), ProcessingError> {
    if cancel.is_cancelled() {
        return Err(ProcessingError::Cancelled(job.job_id.to_string()));
    }

    let raw_sql = job
        .select_sql
        .as_deref()
        .ok_or_else(|| ProcessingError::MissingSelect(job.job_id.to_string()))?;
    let substituted = ctx.variables.substitute(raw_sql);
    let (statement, directives) = extract_map_directives(&substituted)?;

    let mut conn = ctx.source_pool.acquire().await?;

    let result = if directives.is_empty() {
        conn.query_scalar_bool(&statement).await?
    } else {
        let mut tx = conn.begin().await?;
        materialize_directives(&mut tx, ctx.source_dialect.as_ref(), &ctx.memory_store, &directives).await?;
        let rows = tx.query_rows(&statement).await?;
        let value = rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(|v| v.as_bool());
        tx.rollback().await?;
        value
    };

    match result {
        Some(true) => Ok(()),
        Some(false) => Err(ProcessingError::ConditionFalse(job.job_id.to_string())),
        None => Err(ProcessingError::ConditionNotBoolean(job.job_id.to_string())),
    }
}
