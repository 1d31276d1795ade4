//! Error types for ledger primitives and the gateway

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Seed could not be parsed into a signing key
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// Amount is malformed, non-positive, or out of range
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Envelope could not be built
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Account does not exist on the ledger
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Destination requires a memo and the precheck was not skipped
    #[error("Destination {0} requires a memo")]
    MemoRequired(String),

    /// Ledger rejected the submission
    #[error("Submission rejected (status {status}): {title}{}", code_suffix(.result_code))]
    Rejected {
        /// HTTP status returned by the gateway
        status: u16,
        /// Problem title
        title: String,
        /// Transaction result code, when the ledger produced one
        result_code: Option<String>,
    },

    /// Network or protocol failure talking to the gateway
    #[error("Gateway transport error: {0}")]
    Transport(String),

    /// Gateway answered with something we could not interpret
    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" [{}]", c)).unwrap_or_default()
}

impl Error {
    /// Ledger-level result code attached to a rejection
    pub fn result_code(&self) -> Option<&str> {
        match self {
            Error::Rejected { result_code, .. } => result_code.as_deref(),
            _ => None,
        }
    }
}
