use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("Processing failure: {0}")]
    ProcessingFailure(String),
    #[error("Concurrent modification: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl LedgerError {
    /// The bare message, without the kind prefix. Used for transaction notes.
    pub fn detail(&self) -> String {
        match self {
            LedgerError::InvalidArgument(msg)
            | LedgerError::NotFound(msg)
            | LedgerError::PreconditionFailed(msg)
            | LedgerError::ProcessingFailure(msg)
            | LedgerError::Conflict(msg)
            | LedgerError::Storage(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
