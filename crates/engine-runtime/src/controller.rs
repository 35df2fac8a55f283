//! C8 Pipeline Controller: the process-wide entry point that owns the
//! single active run slot, builds a run's shared resources, and drives
//! the scheduler to completion.

use std::sync::Arc;

use connectors::sql::ConnectionPool;
use engine_core::cancellation::CancelToken;
use engine_core::config::ProjectConfig;
use engine_core::event_bus::event::{ProjectEvent, ProjectStatus};
use engine_core::event_bus::EventBus;
use engine_core::log_store::PipelineLogStore;
use memory_store::MemoryStore;
use model::log::{PipelineLog, PipelineStatus};
use planner::dialect::for_kind;
use tokio::sync::Mutex;
use tracing::info;

use crate::context::RunContext;
use crate::error::RuntimeError;
use crate::pipeline_builder::build_pipeline;
use crate::scheduler::{JobExecutor, Scheduler};

/// State for the one run the process is allowed to have active at a
/// time (§4.8 "at most one pipeline runs per process").
struct ActiveRun {
    pipeline_id: String,
    project_id: String,
    cancel: CancelToken,
    log_store: Arc<PipelineLogStore>,
    source_pool: Arc<ConnectionPool>,
    destination_pool: Arc<ConnectionPool>,
}

pub struct Controller {
    active: Mutex<Option<ActiveRun>>,
    event_bus: EventBus,
    log_dir: std::path::PathBuf,
}

/// Builds the `JobExecutor` that will run a pipeline's jobs, given the
/// context the controller assembled. Implemented by `engine-processing`;
/// kept as a trait object here so this crate never depends on it
/// directly.
pub trait ExecutorFactory: Send + Sync {
    fn build(&self, ctx: RunContext) -> Arc<dyn JobExecutor>;
}

impl Controller {
    pub fn new(log_dir: impl Into<std::path::PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            active: Mutex::new(None),
            event_bus: EventBus::new(),
            log_dir: log_dir.into(),
        })
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Runs `config`'s pipeline to completion, returning the final
    /// pipeline log. Fails immediately with `AlreadyRunning` if another
    /// run is in progress (§4.8).
    pub async fn run(
        self: &Arc<Self>,
        run_id: String,
        config: ProjectConfig,
        executor_factory: &dyn ExecutorFactory,
    ) -> Result<PipelineLog, RuntimeError> {
        let cancel = CancelToken::new();
        let pipeline = build_pipeline(run_id.clone(), &config)?;

        let source_kind = config.source_database.dialect.parse().map_err(|_| {
            RuntimeError::Pool(connectors::error::ConnectorError::UnsupportedDialect(
                config.source_database.dialect.clone(),
            ))
        })?;
        let destination_kind = config.destination_database.dialect.parse().map_err(|_| {
            RuntimeError::Pool(connectors::error::ConnectorError::UnsupportedDialect(
                config.destination_database.dialect.clone(),
            ))
        })?;
        let source_pool = Arc::new(ConnectionPool::new(source_kind, &config.source_database.url)?);
        let destination_pool =
            Arc::new(ConnectionPool::new(destination_kind, &config.destination_database.url)?);

        let mut log = PipelineLog::started(
            pipeline.pipeline_id.to_string(),
            config.project_id.clone(),
            config.project_name.clone(),
        );
        // Seed every reachable job as `Pending` up front (§3) so `Stop`
        // always has a row to mark `error` on, even for a job the
        // scheduler never got around to dispatching.
        let order = crate::dag::execution_order(&pipeline, &pipeline.resolve_start_set());
        for job_id in order {
            if let Some(job) = pipeline.jobs.get(&job_id) {
                log.seed_pending(job.job_id.to_string(), job.name.clone(), job.stop_on_error);
            }
        }
        let log_store = PipelineLogStore::new(self.log_dir.clone(), log);

        {
            let mut guard = self.active.lock().await;
            if guard.is_some() {
                return Err(RuntimeError::AlreadyRunning(run_id));
            }
            *guard = Some(ActiveRun {
                pipeline_id: pipeline.pipeline_id.to_string(),
                project_id: config.project_id.clone(),
                cancel: cancel.clone(),
                log_store: log_store.clone(),
                source_pool: source_pool.clone(),
                destination_pool: destination_pool.clone(),
            });
        }

        let result = self
            .run_inner(
                &config,
                pipeline,
                cancel.clone(),
                log_store.clone(),
                source_pool,
                destination_pool,
                executor_factory,
            )
            .await;

        *self.active.lock().await = None;
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_inner(
        self: &Arc<Self>,
        config: &ProjectConfig,
        pipeline: model::execution::pipeline::Pipeline,
        cancel: CancelToken,
        log_store: Arc<PipelineLogStore>,
        source_pool: Arc<ConnectionPool>,
        destination_pool: Arc<ConnectionPool>,
        executor_factory: &dyn ExecutorFactory,
    ) -> Result<PipelineLog, RuntimeError> {
        self.event_bus
            .publish(ProjectEvent { status: ProjectStatus::Running })
            .await;

        let source_kind = source_pool.dialect_kind();
        let destination_kind = destination_pool.dialect_kind();

        let ctx = RunContext {
            pipeline: Arc::new(pipeline.clone()),
            variables: Arc::new(config.variable_map()),
            source_pool,
            destination_pool,
            source_dialect: Arc::from(for_kind(source_kind)),
            destination_dialect: Arc::from(for_kind(destination_kind)),
            memory_store: MemoryStore::new(),
            log_store: log_store.clone(),
            event_bus: self.event_bus.clone(),
            cancel: cancel.clone(),
            concurrency: config.concurrency(),
            metrics: engine_core::metrics::Metrics::new(),
        };

        let executor = executor_factory.build(ctx);
        let outcome = Scheduler::run(&pipeline, executor, cancel.clone()).await;

        let final_status = if cancel.is_cancelled() && !outcome.stop_on_error_triggered {
            PipelineStatus::Stopped
        } else if outcome.stop_on_error_triggered {
            PipelineStatus::Error
        } else {
            PipelineStatus::Done
        };

        log_store
            .mutate(|log| log.finish(final_status))
            .await
            .map_err(RuntimeError::Engine)?;

        self.event_bus
            .publish(ProjectEvent {
                status: match final_status {
                    PipelineStatus::Done => ProjectStatus::Running,
                    PipelineStatus::Stopped => ProjectStatus::Stop,
                    _ => ProjectStatus::Error,
                },
            })
            .await;

        info!(pipeline_id = %pipeline.pipeline_id, status = ?final_status, "pipeline run finished");
        Ok(log_store.snapshot().await)
    }

    /// `Stop(project_id, reason)` (§4.8): targets the active runner whose
    /// `project_id` matches, or any active runner when `project_id` is
    /// empty. Idempotent and synchronous about the parts that can be
    /// done synchronously (§4.5, §5): flips the cancellation token,
    /// closes both connection pools, and marks every not-yet-terminal
    /// job in the log `error` with `reason`. The run itself still winds
    /// down asynchronously — readers/writers mid-flight observe the
    /// token at their next suspension point — the caller observes that
    /// via `run`'s return or the event bus's `project` events.
    pub async fn stop(&self, project_id: &str, reason: impl Into<String>) -> Result<(), RuntimeError> {
        let reason = reason.into();
        let guard = self.active.lock().await;
        match guard.as_ref() {
            Some(active) if project_id.is_empty() || active.project_id == project_id => {
                active.cancel.cancel();
                active.source_pool.close().await.ok();
                active.destination_pool.close().await.ok();
                active
                    .log_store
                    .mutate(|log| log.fail_non_terminal(&reason))
                    .await
                    .map_err(RuntimeError::Engine)?;
                Ok(())
            }
            Some(active) => Err(RuntimeError::NoActiveRun(Some(active.project_id.clone()))),
            None => Err(RuntimeError::NoActiveRun(None)),
        }
    }

    pub async fn active_pipeline_id(&self) -> Option<String> {
        self.active.lock().await.as_ref().map(|a| a.pipeline_id.clone())
    }

    /// A live snapshot of the active run's pipeline log, if `pipeline_id`
    /// matches the currently running pipeline.
    pub async fn snapshot(&self, pipeline_id: &str) -> Option<PipelineLog> {
        let guard = self.active.lock().await;
        match guard.as_ref() {
            Some(active) if active.pipeline_id == pipeline_id => {
                Some(active.log_store.snapshot().await)
            }
            _ => None,
        }
    }
}
