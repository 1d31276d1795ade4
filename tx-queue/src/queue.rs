//! Queue API shared by the Postgres and in-memory backends

use crate::types::{NewTransaction, StateCounts, TransactionRecord};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Durable transaction queue.
#[async_trait]
pub trait TransactionQueue: Debug + Send + Sync {
    /// Inserts a pending row and returns its id.
    async fn enqueue(&self, tx: NewTransaction) -> Result<i64>;

    /// Atomically claims up to `limit` pending rows, moving them to `sending`.
    ///
    /// The returned rows are owned by the caller; no concurrent caller can receive them.
    /// On error nothing is changed.
    async fn claim_pending(&self, limit: usize) -> Result<Vec<TransactionRecord>>;

    /// Records the envelope hash of a `sending` row. Must precede submission.
    async fn record_hash(&self, id: i64, hash: &str) -> Result<()>;

    /// Moves a hashed `sending` row to `sent`.
    async fn finalize_success(&self, id: i64) -> Result<()>;

    /// Moves a hashed `sending` row to `error`.
    async fn finalize_error(&self, id: i64) -> Result<()>;

    /// Reads a row.
    async fn get(&self, id: i64) -> Result<TransactionRecord>;

    /// Counts rows per state.
    async fn count_by_state(&self) -> Result<StateCounts>;

    /// Rows claimed before `cutoff` that are still `sending`.
    async fn list_sending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<TransactionRecord>>;
}
