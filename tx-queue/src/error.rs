//! Error types for the transaction queue

use crate::types::TxState;
use thiserror::Error;

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Queue errors
#[derive(Error, Debug)]
pub enum QueueError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Row does not exist
    #[error("Transaction not found: {0}")]
    NotFound(i64),

    /// Row is not in a state that allows the requested operation
    #[error("Invalid transition for transaction {id}: cannot {operation} while {state}")]
    InvalidTransition {
        /// Row id
        id: i64,
        /// State the row was found in
        state: TxState,
        /// Operation that was refused
        operation: &'static str,
    },

    /// Finalization attempted before the hash checkpoint
    #[error("Transaction {0} has no recorded hash")]
    MissingHash(i64),

    /// A hash is already recorded; it is never overwritten
    #[error("Transaction {0} already has a recorded hash")]
    HashAlreadyRecorded(i64),

    /// Internal consistency check failed; indicates a bug
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Stored state string is not one of the known states
    #[error("Unknown transaction state: {0}")]
    UnknownState(String),
}
