//! Queue row types

use crate::QueueError;
use chrono::{DateTime, SubsecRound, Utc};
use std::fmt;
use std::str::FromStr;

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxState {
    /// Waiting to be claimed
    Pending,
    /// Claimed by a dispatcher; hash may or may not be recorded yet
    Sending,
    /// Accepted by the ledger
    Sent,
    /// Submission failed; never retried automatically
    Error,
}

impl TxState {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::Pending => "pending",
            TxState::Sending => "sending",
            TxState::Sent => "sent",
            TxState::Error => "error",
        }
    }

    /// Whether the row can no longer change
    pub fn is_final(&self) -> bool {
        matches!(self, TxState::Sent | TxState::Error)
    }
}

impl FromStr for TxState {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TxState::Pending),
            "sending" => Ok(TxState::Sending),
            "sent" => Ok(TxState::Sent),
            "error" => Ok(TxState::Error),
            _ => Err(QueueError::UnknownState(s.to_string())),
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued outgoing transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Row id
    pub id: i64,
    /// Producer correlation key
    pub external_id: String,
    /// Current state
    pub state: TxState,
    /// When the row was claimed
    pub sending_at: Option<DateTime<Utc>>,
    /// When the ledger accepted the transaction
    pub sent_at: Option<DateTime<Utc>>,
    /// Receiving account
    pub destination: String,
    /// Amount as written by the producer
    pub amount: String,
    /// Hex hash of the submitted envelope
    pub hash: Option<String>,
}

/// Row inserted by a producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Producer correlation key
    pub external_id: String,
    /// Receiving account
    pub destination: String,
    /// Amount
    pub amount: String,
}

impl NewTransaction {
    /// Create a new pending transaction
    pub fn new(
        external_id: impl Into<String>,
        destination: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            destination: destination.into(),
            amount: amount.into(),
        }
    }
}

/// Number of rows per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    /// Rows waiting to be claimed
    pub pending: i64,
    /// Rows claimed and not yet finalized
    pub sending: i64,
    /// Rows accepted by the ledger
    pub sent: i64,
    /// Rows whose submission failed
    pub error: i64,
}

impl StateCounts {
    pub(crate) fn add(&mut self, state: TxState, count: i64) {
        match state {
            TxState::Pending => self.pending += count,
            TxState::Sending => self.sending += count,
            TxState::Sent => self.sent += count,
            TxState::Error => self.error += count,
        }
    }

    /// Total rows
    pub fn total(&self) -> i64 {
        self.pending + self.sending + self.sent + self.error
    }
}

/// State-changing operations applied to a claimed row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    RecordHash,
    FinalizeSuccess,
    FinalizeError,
}

impl Operation {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Operation::RecordHash => "record hash",
            Operation::FinalizeSuccess => "finalize as sent",
            Operation::FinalizeError => "finalize as error",
        }
    }

    /// Checks that `record` may undergo this operation
    pub(crate) fn check(&self, record: &TransactionRecord) -> Result<(), QueueError> {
        if record.state != TxState::Sending {
            return Err(QueueError::InvalidTransition {
                id: record.id,
                state: record.state,
                operation: self.as_str(),
            });
        }
        match (self, &record.hash) {
            (Operation::RecordHash, Some(_)) => Err(QueueError::HashAlreadyRecorded(record.id)),
            (Operation::FinalizeSuccess | Operation::FinalizeError, None) => {
                Err(QueueError::MissingHash(record.id))
            }
            _ => Ok(()),
        }
    }
}

/// Current time at the precision Postgres stores (microseconds)
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
