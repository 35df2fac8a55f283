//! C4 Count Preflight Worker: a single consumer task that serializes
//! `total_count` calls against the source so the controller can submit
//! one request per insert job, in topological order, before execution
//! begins (§4.4).

use std::collections::HashMap;
use std::sync::Arc;

use connectors::error::ErrorKind;
use connectors::sql::ConnectionPool;
use engine_core::event_bus::EventBus;
use engine_core::event_bus::event::CountsEvent;
use engine_core::retry::{RetryDisposition, RetryError, RetryPolicy};
use model::core::identifiers::JobId;
use planner::Dialect;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::error::ProcessingError;

struct CountRequest {
    job_id: JobId,
    select_sql: String,
    reply: oneshot::Sender<Result<u64, ProcessingError>>,
}

#[derive(Clone)]
pub struct CountPreflightWorker {
    tx: mpsc::Sender<CountRequest>,
}

impl CountPreflightWorker {
    /// Spawns the consumer task. `total_jobs` is the denominator reported
    /// on every `counts` event (§6).
    pub fn spawn(
        pool: Arc<ConnectionPool>,
        dialect: Arc<dyn Dialect>,
        event_bus: EventBus,
        total_jobs: u64,
    ) -> Self {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(Self::run(rx, pool, dialect, event_bus, total_jobs));
        Self { tx }
    }

    /// Requests the total row count for `select_sql`, deduplicated by
    /// `job_id` on the worker side.
    pub async fn count(&self, job_id: JobId, select_sql: String) -> Result<u64, ProcessingError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(CountRequest { job_id, select_sql, reply })
            .await
            .map_err(|_| ProcessingError::WorkerStopped)?;
        rx.await.map_err(|_| ProcessingError::WorkerStopped)?
    }

    async fn run(
        mut rx: mpsc::Receiver<CountRequest>,
        pool: Arc<ConnectionPool>,
        dialect: Arc<dyn Dialect>,
        event_bus: EventBus,
        total_jobs: u64,
    ) {
        let mut completed: HashMap<JobId, u64> = HashMap::new();
        let mut done = 0u64;

        while let Some(req) = rx.recv().await {
            if let Some(cached) = completed.get(&req.job_id) {
                let _ = req.reply.send(Ok(*cached));
                continue;
            }

            let result = Self::execute_count(&pool, dialect.as_ref(), &req.select_sql).await;
            if let Ok(total) = result {
                completed.insert(req.job_id.clone(), total);
                done += 1;
                event_bus.publish(CountsEvent { done, total: total_jobs }).await;
            } else if let Err(e) = &result {
                warn!(job_id = %req.job_id, error = %e, "count preflight failed");
            }
            let _ = req.reply.send(result);
        }
    }

    /// Retries only `connection_error`-classified failures (§7) — a
    /// dropped/idle connection acquiring the count is transient in a way
    /// a syntax or permission error never is. Uses the same policy the
    /// `retry` module documents as reserved for this path.
    async fn execute_count(
        pool: &ConnectionPool,
        dialect: &dyn Dialect,
        select_sql: &str,
    ) -> Result<u64, ProcessingError> {
        let sql = dialect.total_count_sql(select_sql);
        let policy = RetryPolicy::for_database();

        let result = policy
            .run(
                || async {
                    let mut conn = pool.acquire().await?;
                    conn.query_scalar_i64(&sql).await
                },
                |e| {
                    if e.kind() == ErrorKind::Connection {
                        RetryDisposition::Retry
                    } else {
                        RetryDisposition::Stop
                    }
                },
            )
            .await;

        let count = match result {
            Ok(count) => count,
            Err(RetryError::Fatal(e)) | Err(RetryError::AttemptsExceeded(e)) => return Err(e.into()),
        };
        Ok(count.unwrap_or(0).max(0) as u64)
    }
}
