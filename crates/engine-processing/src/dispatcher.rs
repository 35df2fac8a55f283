//! Wires the four job kinds to their executors and implements
//! `engine_runtime::JobExecutor`/`ExecutorFactory` so the controller (C8)
//! never has to know this crate exists by name.

use std::sync::Arc;

use async_trait::async_trait;
use engine_core::cancellation::CancelToken;
use engine_core::event_bus::event::{JobSnapshot, JobsEvent};
use engine_runtime::{ExecutorFactory, JobExecutor, JobOutcome, RunContext};
use model::core::identifiers::JobId;
use model::execution::job::JobKind;
use model::log::JobLog;
use tracing::{error, info};

use crate::condition;
use crate::copy_executor;
use crate::count_worker::CountPreflightWorker;
use crate::execution;
use crate::memory_select;

pub struct Dispatcher {
    ctx: RunContext,
    count_worker: CountPreflightWorker,
}

impl Dispatcher {
    async fn publish_jobs_snapshot(&self) {
        let log = self.ctx.log_store.snapshot().await;
        let jobs = log
            .jobs
            .iter()
            .map(|jl| JobSnapshot {
                id: jl.job_id.clone(),
                name: jl.name.clone(),
                total: jl.total,
                processed: jl.processed,
                progress_pct: jl.progress_pct(),
                status: format!("{:?}", jl.status).to_lowercase(),
                started_at: jl.started_at,
                ended_at: jl.ended_at,
                error: jl.error.clone(),
            })
            .collect();
        let metrics = self.ctx.metrics.snapshot();
        self.ctx.event_bus.publish(JobsEvent { jobs, metrics }).await;
    }
}

#[async_trait]
impl JobExecutor for Dispatcher {
    async fn execute(&self, job_id: &JobId, cancel: CancelToken) -> JobOutcome {
        let Some(job) = self.ctx.pipeline.jobs.get(job_id).cloned() else {
            error!(%job_id, "scheduler dispatched an unknown job id");
            return JobOutcome::Failed { stop_on_error: false };
        };

        self.ctx
            .log_store
            .mutate(|log| match log.job_mut(job.job_id.as_str()) {
                // The controller seeds a `Pending` row for every
                // reachable job before the scheduler starts (§3); the
                // common case is just transitioning it to `Running`.
                Some(jl) => jl.start(),
                None => log.jobs.push(JobLog::started(
                    job.job_id.to_string(),
                    job.name.clone(),
                    job.stop_on_error,
                )),
            })
            .await
            .ok();
        self.publish_jobs_snapshot().await;

        // `Stop` may have already marked this job `error` between the
        // scheduler deciding to dispatch it and this task actually
        // running (§5 "a stopped run never starts new jobs"); bail out
        // before touching source/destination instead of racing it.
        if cancel.is_cancelled() {
            return JobOutcome::Failed { stop_on_error: false };
        }

        info!(job_id = %job.job_id, kind = ?job.kind, "starting job");

        let result = match job.kind {
            JobKind::Insert => {
                copy_executor::run(&self.ctx, &job, Some(&self.count_worker), cancel).await
            }
            JobKind::Execution => execution::run(&self.ctx, &job, cancel).await,
            JobKind::Condition => condition::run(&self.ctx, &job, cancel).await,
            JobKind::MemorySelect => memory_select::run(&self.ctx, &job, cancel).await,
        };

        match result {
            Ok(()) => {
                self.ctx
                    .log_store
                    .mutate(|log| {
                        if let Some(jl) = log.job_mut(job.job_id.as_str()) {
                            jl.complete();
                        }
                    })
                    .await
                    .ok();
                self.publish_jobs_snapshot().await;
                JobOutcome::Done
            }
            Err(e) => {
                let kind = e.classify();
                self.ctx
                    .log_store
                    .mutate(|log| {
                        if let Some(jl) = log.job_mut(job.job_id.as_str()) {
                            jl.fail(e.to_string(), Some(kind.as_str().to_string()), None);
                        }
                    })
                    .await
                    .ok();
                self.publish_jobs_snapshot().await;
                JobOutcome::Failed { stop_on_error: job.stop_on_error }
            }
        }
    }

    async fn skip(&self, job_id: &JobId, reason: &str) {
        let Some(job) = self.ctx.pipeline.jobs.get(job_id).cloned() else {
            return;
        };
        self.ctx
            .log_store
            .mutate(|log| match log.job_mut(job.job_id.as_str()) {
                Some(jl) => jl.fail(reason.to_string(), None, None),
                None => {
                    let mut jl = JobLog::pending(
                        job.job_id.to_string(),
                        job.name.clone(),
                        job.stop_on_error,
                    );
                    jl.fail(reason.to_string(), None, None);
                    log.jobs.push(jl);
                }
            })
            .await
            .ok();
        self.publish_jobs_snapshot().await;
    }
}

/// Builds a `Dispatcher` and kicks off the C4 count preflight for every
/// insert job that has no Map directives, in topological order, before
/// the scheduler starts dispatching (§4.4 "the controller submits one
/// request per insert job in topological order before execution
/// begins").
pub struct ProcessingExecutorFactory;

impl ExecutorFactory for ProcessingExecutorFactory {
    fn build(&self, ctx: RunContext) -> Arc<dyn JobExecutor> {
        let total_insert_jobs = ctx.pipeline.jobs.values().filter(|j| j.is_copy_job()).count() as u64;
        let count_worker = CountPreflightWorker::spawn(
            ctx.source_pool.clone(),
            ctx.source_dialect.clone(),
            ctx.event_bus.clone(),
            total_insert_jobs,
        );

        let order = engine_runtime::dag::execution_order(&ctx.pipeline, &ctx.pipeline.resolve_start_set());
        for job_id in order {
            let Some(job) = ctx.pipeline.jobs.get(&job_id) else {
                continue;
            };
            if !job.is_copy_job() {
                continue;
            }
            let Some(raw_select) = job.select_sql.as_deref() else {
                continue;
            };
            let substituted = ctx.variables.substitute(raw_select);
            let Ok((without_map, directives)) = planner::rewriter::extract_map_directives(&substituted) else {
                continue;
            };
            if !directives.is_empty() {
                continue;
            }
            let (_, clean_select) = planner::rewriter::analyze_and_modify(&without_map);

            let worker = count_worker.clone();
            let job_id = job.job_id.clone();
            tokio::spawn(async move {
                if let Err(e) = worker.count(job_id.clone(), clean_select).await {
                    error!(job_id = %job_id, error = %e, "count preflight failed");
                }
            });
        }

        Arc::new(Dispatcher { ctx, count_worker })
    }
}
