//! Shared fixtures for dispatcher integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use channel_pool::Channel;
use chrono::{DateTime, Utc};
use dispatcher::{Dispatcher, DispatcherHandle, DispatcherMetrics, EnvelopeBuilder};
use ledger_core::{Asset, KeyPair, LedgerGateway, MockGateway, NetworkId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tx_queue::{
    MemoryQueue, NewTransaction, QueueError, StateCounts, TransactionQueue, TransactionRecord,
    TxState,
};

pub const PASSPHRASE: &str = "Test Network";
pub const FUNDING_SEED: [u8; 32] = [1; 32];
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn channel_seed(index: usize) -> [u8; 32] {
    [0x40 + index as u8; 32]
}

pub fn channel_key(index: usize) -> KeyPair {
    KeyPair::from_seed(&channel_seed(index))
}

pub fn builder() -> EnvelopeBuilder {
    EnvelopeBuilder::new(
        NetworkId::from_passphrase(PASSPHRASE),
        KeyPair::from_seed(&FUNDING_SEED),
        Asset::Native,
        100,
    )
}

/// Queue, mock ledger and channel accounts wired for one dispatcher
pub struct Harness {
    pub queue: Arc<MemoryQueue>,
    pub gateway: Arc<MockGateway>,
    pub metrics: Arc<DispatcherMetrics>,
    pub channels: usize,
}

impl Harness {
    /// `channels` funded channel accounts, all starting at `sequence`
    pub fn new(channels: usize, sequence: i64) -> Self {
        let gateway = MockGateway::new();
        for i in 0..channels {
            gateway.insert_account(channel_key(i).account_id(), sequence);
        }
        Self {
            queue: Arc::new(MemoryQueue::new()),
            gateway: Arc::new(gateway),
            metrics: Arc::new(DispatcherMetrics::new().unwrap()),
            channels,
        }
    }

    pub async fn enqueue(&self, destination: &str, amount: &str) -> i64 {
        let external_id = format!("ext-{}", self.queue.snapshot().len() + 1);
        self.queue
            .enqueue(NewTransaction::new(external_id, destination, amount))
            .await
            .unwrap()
    }

    pub fn channel_list(&self) -> Vec<Channel> {
        (0..self.channels)
            .map(|i| Channel::from_keypair(channel_key(i)))
            .collect()
    }

    pub async fn start(&self) -> dispatcher::Result<DispatcherHandle> {
        self.start_with(self.queue.clone(), self.gateway.clone()).await
    }

    pub async fn start_with(
        &self,
        queue: Arc<dyn TransactionQueue>,
        gateway: Arc<dyn LedgerGateway>,
    ) -> dispatcher::Result<DispatcherHandle> {
        Dispatcher::new(queue, gateway, builder(), self.metrics.clone(), POLL_INTERVAL)
            .start(self.channel_list(), CancellationToken::new())
            .await
    }

    pub fn state(&self, id: i64) -> TxState {
        self.queue
            .snapshot()
            .into_iter()
            .find(|r| r.id == id)
            .map(|r| r.state)
            .unwrap()
    }
}

/// Wait until at least `expected` rows are `sent` or `error`
pub async fn wait_for_final(queue: &MemoryQueue, expected: i64) {
    let reached = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let counts = queue.count_by_state().await.unwrap();
            if counts.sent + counts.error >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "rows were not finalized in time");
}

/// Memory queue with injected store failures and a configurable claim order
#[derive(Debug)]
pub struct FaultyQueue {
    pub inner: Arc<MemoryQueue>,
    failing_claims: AtomicUsize,
    failing_hashes: AtomicUsize,
    reverse_claims: bool,
}

impl FaultyQueue {
    pub fn new(inner: Arc<MemoryQueue>) -> Self {
        Self {
            inner,
            failing_claims: AtomicUsize::new(0),
            failing_hashes: AtomicUsize::new(0),
            reverse_claims: false,
        }
    }

    /// The next `n` claims fail
    pub fn fail_claims(self, n: usize) -> Self {
        self.failing_claims.store(n, Ordering::SeqCst);
        self
    }

    /// The next `n` hash checkpoints fail
    pub fn fail_hashes(self, n: usize) -> Self {
        self.failing_hashes.store(n, Ordering::SeqCst);
        self
    }

    /// Claimed batches come back newest first
    pub fn reverse_claims(mut self) -> Self {
        self.reverse_claims = true;
        self
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn outage() -> QueueError {
    QueueError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl TransactionQueue for FaultyQueue {
    async fn enqueue(&self, tx: NewTransaction) -> tx_queue::Result<i64> {
        self.inner.enqueue(tx).await
    }

    async fn claim_pending(&self, limit: usize) -> tx_queue::Result<Vec<TransactionRecord>> {
        if Self::take_failure(&self.failing_claims) {
            return Err(outage());
        }
        let mut rows = self.inner.claim_pending(limit).await?;
        if self.reverse_claims {
            rows.reverse();
        }
        Ok(rows)
    }

    async fn record_hash(&self, id: i64, hash: &str) -> tx_queue::Result<()> {
        if Self::take_failure(&self.failing_hashes) {
            return Err(outage());
        }
        self.inner.record_hash(id, hash).await
    }

    async fn finalize_success(&self, id: i64) -> tx_queue::Result<()> {
        self.inner.finalize_success(id).await
    }

    async fn finalize_error(&self, id: i64) -> tx_queue::Result<()> {
        self.inner.finalize_error(id).await
    }

    async fn get(&self, id: i64) -> tx_queue::Result<TransactionRecord> {
        self.inner.get(id).await
    }

    async fn count_by_state(&self) -> tx_queue::Result<StateCounts> {
        self.inner.count_by_state().await
    }

    async fn list_sending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> tx_queue::Result<Vec<TransactionRecord>> {
        self.inner.list_sending_before(cutoff).await
    }
}
