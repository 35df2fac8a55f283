use model::dataset::TypeInferenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("duplicate Map directive key: {0}")]
    DuplicateMapKey(String),

    #[error("invalid Map directive key: {0}")]
    InvalidMapKey(String),

    #[error("could not locate table name after INSERT INTO")]
    MissingInsertTable,

    #[error("{0}")]
    TypeInference(#[from] TypeInferenceError),

    #[error("insert job {0} declares no columns to build an INSERT from")]
    NoColumns(String),

    #[error("cannot partition rows for {dialect}: job has no primary_keys and no physical row identifier is available")]
    NoPartitionKey { dialect: String },
}
