//! In-memory queue backend.
//!
//! Mirrors the Postgres backend's transition rules. Used by tests and local runs.

use crate::error::{QueueError, Result};
use crate::queue::TransactionQueue;
use crate::types::{now, NewTransaction, Operation, StateCounts, TransactionRecord, TxState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    rows: BTreeMap<i64, TransactionRecord>,
}

/// [`TransactionQueue`] kept in process memory
#[derive(Debug, Default)]
pub struct MemoryQueue {
    inner: Mutex<Inner>,
}

impl MemoryQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row in id order
    pub fn snapshot(&self) -> Vec<TransactionRecord> {
        self.inner.lock().rows.values().cloned().collect()
    }

    fn apply(&self, id: i64, op: Operation, hash: Option<&str>) -> Result<()> {
        let mut inner = self.inner.lock();
        let row = inner.rows.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        op.check(row)?;

        match op {
            Operation::RecordHash => row.hash = hash.map(str::to_string),
            Operation::FinalizeSuccess => {
                row.state = TxState::Sent;
                row.sent_at = Some(now());
            }
            Operation::FinalizeError => row.state = TxState::Error,
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionQueue for MemoryQueue {
    async fn enqueue(&self, tx: NewTransaction) -> Result<i64> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.rows.insert(
            id,
            TransactionRecord {
                id,
                external_id: tx.external_id,
                state: TxState::Pending,
                sending_at: None,
                sent_at: None,
                destination: tx.destination,
                amount: tx.amount,
                hash: None,
            },
        );
        Ok(id)
    }

    async fn claim_pending(&self, limit: usize) -> Result<Vec<TransactionRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // Select and update happen under one lock, so the pending re-check done by the
        // Postgres backend cannot fail here
        let mut inner = self.inner.lock();
        let claimed_at = now();
        let claimed = inner
            .rows
            .values_mut()
            .filter(|row| row.state == TxState::Pending)
            .take(limit)
            .map(|row| {
                row.state = TxState::Sending;
                row.sending_at = Some(claimed_at);
                row.clone()
            })
            .collect();
        Ok(claimed)
    }

    async fn record_hash(&self, id: i64, hash: &str) -> Result<()> {
        self.apply(id, Operation::RecordHash, Some(hash))
    }

    async fn finalize_success(&self, id: i64) -> Result<()> {
        self.apply(id, Operation::FinalizeSuccess, None)
    }

    async fn finalize_error(&self, id: i64) -> Result<()> {
        self.apply(id, Operation::FinalizeError, None)
    }

    async fn get(&self, id: i64) -> Result<TransactionRecord> {
        self.inner
            .lock()
            .rows
            .get(&id)
            .cloned()
            .ok_or(QueueError::NotFound(id))
    }

    async fn count_by_state(&self) -> Result<StateCounts> {
        let mut counts = StateCounts::default();
        for row in self.inner.lock().rows.values() {
            counts.add(row.state, 1);
        }
        Ok(counts)
    }

    async fn list_sending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .inner
            .lock()
            .rows
            .values()
            .filter(|row| row.state == TxState::Sending)
            .filter(|row| row.sending_at.map_or(false, |at| at < cutoff))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(n: usize) -> MemoryQueue {
        let queue = MemoryQueue::new();
        for i in 0..n {
            queue
                .enqueue(NewTransaction::new(format!("ext-{}", i), "ACCT_B", "20"))
                .await
                .unwrap();
        }
        queue
    }

    #[tokio::test]
    async fn test_claim_oldest_first() {
        let queue = seeded(5).await;

        let claimed = queue.claim_pending(3).await.unwrap();
        let ids: Vec<i64> = claimed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(claimed
            .iter()
            .all(|r| r.state == TxState::Sending && r.sending_at.is_some()));

        let rest = queue.claim_pending(10).await.unwrap();
        assert_eq!(rest.iter().map(|r| r.id).collect::<Vec<_>>(), vec![4, 5]);
        assert!(queue.claim_pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_zero_changes_nothing() {
        let queue = seeded(2).await;
        assert!(queue.claim_pending(0).await.unwrap().is_empty());
        assert_eq!(queue.count_by_state().await.unwrap().pending, 2);
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let queue = seeded(2).await;
        queue.claim_pending(2).await.unwrap();

        queue.record_hash(1, "aa").await.unwrap();
        queue.finalize_success(1).await.unwrap();
        queue.record_hash(2, "bb").await.unwrap();
        queue.finalize_error(2).await.unwrap();

        let sent = queue.get(1).await.unwrap();
        assert_eq!(sent.state, TxState::Sent);
        assert_eq!(sent.hash.as_deref(), Some("aa"));
        assert!(sent.sent_at.is_some());

        let failed = queue.get(2).await.unwrap();
        assert_eq!(failed.state, TxState::Error);
        assert_eq!(failed.hash.as_deref(), Some("bb"));
        assert!(failed.sent_at.is_none());

        let counts = queue.count_by_state().await.unwrap();
        assert_eq!((counts.sent, counts.error, counts.total()), (1, 1, 2));
    }

    #[tokio::test]
    async fn test_finalize_requires_hash() {
        let queue = seeded(1).await;
        queue.claim_pending(1).await.unwrap();

        assert!(matches!(
            queue.finalize_success(1).await,
            Err(QueueError::MissingHash(1))
        ));
        assert_eq!(queue.get(1).await.unwrap().state, TxState::Sending);
    }

    #[tokio::test]
    async fn test_hash_is_never_overwritten() {
        let queue = seeded(1).await;
        queue.claim_pending(1).await.unwrap();
        queue.record_hash(1, "aa").await.unwrap();

        assert!(matches!(
            queue.record_hash(1, "bb").await,
            Err(QueueError::HashAlreadyRecorded(1))
        ));
        assert_eq!(queue.get(1).await.unwrap().hash.as_deref(), Some("aa"));
    }

    #[tokio::test]
    async fn test_final_rows_are_immutable() {
        let queue = seeded(1).await;
        queue.claim_pending(1).await.unwrap();
        queue.record_hash(1, "aa").await.unwrap();
        queue.finalize_success(1).await.unwrap();

        assert!(matches!(
            queue.finalize_error(1).await,
            Err(QueueError::InvalidTransition {
                state: TxState::Sent,
                ..
            })
        ));
        assert_eq!(queue.get(1).await.unwrap().state, TxState::Sent);
    }

    #[tokio::test]
    async fn test_unclaimed_and_missing_rows() {
        let queue = seeded(1).await;
        assert!(matches!(
            queue.record_hash(1, "aa").await,
            Err(QueueError::InvalidTransition {
                state: TxState::Pending,
                ..
            })
        ));
        assert!(matches!(queue.get(42).await, Err(QueueError::NotFound(42))));
        assert!(matches!(
            queue.finalize_success(42).await,
            Err(QueueError::NotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_list_sending_before() {
        let queue = seeded(3).await;
        queue.claim_pending(2).await.unwrap();
        queue.record_hash(1, "aa").await.unwrap();
        queue.finalize_success(1).await.unwrap();

        let later = Utc::now() + chrono::Duration::seconds(1);
        let stuck = queue.list_sending_before(later).await.unwrap();
        assert_eq!(stuck.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);

        let earlier = Utc::now() - chrono::Duration::hours(1);
        assert!(queue.list_sending_before(earlier).await.unwrap().is_empty());
    }
}
