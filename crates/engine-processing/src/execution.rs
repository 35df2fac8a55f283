//! C7 Execution job: a free-form statement run against `job.connection`
//! (source or destination, default destination), with Map directives
//! materialized into a transaction on that same target when present
//! (§4.7).

use engine_core::cancellation::CancelToken;
use model::execution::job::{Job, JobConnection};
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

    let (pool, dialect) = match job.connection {
        JobConnection::Source => (&ctx.source_pool, ctx.source_dialect.as_ref()),
        JobConnection::Destination => (&ctx.destination_pool, ctx.destination_dialect.as_ref()),
    };

    let mut conn = pool.acquire().await?;
    if directives.is_empty() {
        conn.execute(&statement).await?;
    } else {
        let mut tx = conn.begin().await?;
        materialize_directives(&mut tx, dialect, &ctx.memory_store, &directives).await?;
        tx.execute(&statement).await?;
        tx.commit().await?;
    }

    Ok(())
}
