//! Error types for the dispatcher

use thiserror::Error;

/// Result type for dispatcher operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Dispatcher errors
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Queue error
    #[error("Queue error: {0}")]
    Queue(#[from] tx_queue::QueueError),

    /// Channel pool error
    #[error("Channel pool error: {0}")]
    Pool(#[from] channel_pool::PoolError),

    /// Ledger or envelope error
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A dispatcher task panicked or was aborted
    #[error("Task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for DispatchError {
    fn from(err: tokio::task::JoinError) -> Self {
        DispatchError::Task(err.to_string())
    }
}
