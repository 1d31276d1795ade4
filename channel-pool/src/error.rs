//! Error types for the channel pool

use ledger_core::AccountId;
use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Channel pool errors
#[derive(Error, Debug)]
pub enum PoolError {
    /// Seed parsing or gateway failure
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Gateway reported a different account than the one requested
    #[error("Account mismatch: requested {expected}, gateway returned {reported}")]
    AccountMismatch {
        /// Account derived from the channel seed
        expected: AccountId,
        /// Account id in the gateway response
        reported: AccountId,
    },

    /// Sequence number cannot be incremented further
    #[error("Sequence number overflow on channel {0}")]
    SequenceOverflow(AccountId),

    /// No channels configured
    #[error("Channel pool is empty")]
    EmptyPool,

    /// Two seeds derive the same account
    #[error("Duplicate channel account: {0}")]
    DuplicateChannel(AccountId),
}
