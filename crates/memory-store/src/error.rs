use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryStoreError {
    #[error("memory dataset key normalizes to empty string")]
    EmptyKey,

    #[error("memory dataset key {0} already exists (write-once)")]
    AlreadyExists(String),

    #[error("no memory dataset registered under key {0}")]
    NotFound(String),
}
