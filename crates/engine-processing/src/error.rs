use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Connector(#[from] connectors::error::ConnectorError),

    #[error(transparent)]
    Planner(#[from] planner::PlannerError),

    #[error(transparent)]
    MemoryStore(#[from] memory_store::MemoryStoreError),

    #[error("count preflight worker is no longer running")]
    WorkerStopped,

    #[error("job {0} has no select_sql")]
    MissingSelect(String),

    #[error("job {0} has no insert_sql")]
    MissingInsert(String),

    #[error("memory-select job {0} must declare at least one column")]
    EmptyColumns(String),

    #[error("condition job {0} returned false")]
    ConditionFalse(String),

    #[error("condition job {0} did not return a boolean scalar")]
    ConditionNotBoolean(String),

    #[error("copy job {0} processed {processed} of {total} rows")]
    Incomplete {
        job_id: String,
        processed: u64,
        total: u64,
    },

    #[error("job {0} was cancelled")]
    Cancelled(String),
}

impl ProcessingError {
    /// Classifies this error into the §7 taxonomy for the job/batch log,
    /// falling back to `unknown_error` for anything not driver-sourced.
    pub fn classify(&self) -> connectors::error::ErrorKind {
        match self {
            ProcessingError::Connector(e) => e.kind(),
            _ => connectors::error::ErrorKind::Unknown,
        }
    }
}
