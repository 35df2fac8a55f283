use thiserror::Error;

/// Top-level ambient-stack error type: configuration loading and
/// pipeline-log persistence failures that don't belong to any single
/// executor. Scheduler/executor-specific errors live in their own
/// crates (`engine_runtime::error::RuntimeError`,
/// `engine_processing::error::ProcessingError`).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read project config at {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse project config at {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: ConfigParseError,
    },

    #[error("unrecognized project config extension: {0} (expected .json, .yaml, or .yml)")]
    UnknownConfigExtension(String),

    #[error("failed to persist pipeline log to {path}: {source}")]
    LogPersist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connector error: {0}")]
    Connector(#[from] connectors::error::ConnectorError),
}

#[derive(Debug, Error)]
pub enum ConfigParseError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
