use engine_core::error::EngineError;
use engine_runtime::RuntimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load project config: {0}")]
    ProjectConfig(#[from] EngineError),

    #[error("failed to serialize to JSON: {0}")]
    JsonSerialize(serde_json::Error),

    #[error("invalid connection format provided: {0}")]
    InvalidConnectionFormat(String),

    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("pipeline run failed: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("no pipeline log found for id {0}")]
    NoSuchPipeline(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}
