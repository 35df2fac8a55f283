use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("pipeline {0} is already running; only one pipeline may run at a time")]
    AlreadyRunning(String),

    #[error("no active pipeline run for project {0:?}")]
    NoActiveRun(Option<String>),

    #[error("failed to open connection pool: {0}")]
    Pool(#[from] connectors::error::ConnectorError),

    #[error("engine error: {0}")]
    Engine(#[from] engine_core::error::EngineError),

    #[error("job {0} references unknown job id in its edge list")]
    UnknownJob(String),
}
