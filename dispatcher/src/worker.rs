//! Per-channel workers

use crate::builder::EnvelopeBuilder;
use crate::metrics::DispatcherMetrics;
use channel_pool::LoadedChannel;
use ledger_core::{LedgerGateway, SubmitOptions};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use tx_queue::{TransactionQueue, TransactionRecord, TxState};

/// Receiving end of the relay, shared by all workers
pub(crate) type Relay = Arc<Mutex<mpsc::Receiver<TransactionRecord>>>;

/// What a worker did with one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Row was no longer `sending`, or could not be read
    Skipped,
    /// No envelope could be built; row left `sending`
    ConstructionFailed,
    /// Hash could not be recorded; nothing was submitted and the sequence was given back
    HashNotRecorded,
    /// Ledger accepted the envelope
    Sent,
    /// Ledger or transport rejected the envelope
    Failed,
}

/// Collaborators shared by every worker
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) queue: Arc<dyn TransactionQueue>,
    pub(crate) gateway: Arc<dyn LedgerGateway>,
    pub(crate) builder: EnvelopeBuilder,
    pub(crate) metrics: Arc<DispatcherMetrics>,
}

/// Drains the relay on one channel, one row at a time, until the relay is closed and empty.
pub(crate) async fn run(channel: Arc<LoadedChannel>, relay: Relay, shared: Arc<Shared>) {
    debug!(channel = %channel.account_id(), "Worker started");

    loop {
        let next = relay.lock().await.recv().await;
        let Some(record) = next else {
            break;
        };
        process(&shared, &channel, record).await;
    }

    debug!(channel = %channel.account_id(), "Worker stopped");
}

/// Build, checkpoint, submit and finalize one claimed row.
pub(crate) async fn process(
    shared: &Shared,
    channel: &LoadedChannel,
    record: TransactionRecord,
) -> Outcome {
    let tx_id = record.id;

    let current = match shared.queue.get(tx_id).await {
        Ok(current) => current,
        Err(e) => {
            warn!(tx_id, error = %e, "Could not re-read claimed transaction; skipping");
            return Outcome::Skipped;
        }
    };
    if current.state != TxState::Sending {
        warn!(tx_id, state = %current.state, "Transaction no longer sending; skipping");
        return Outcome::Skipped;
    }

    let envelope = match shared.builder.build(&current, channel) {
        Ok(envelope) => envelope,
        Err(e) => {
            shared.metrics.construction_failures.inc();
            error!(
                tx_id,
                channel = %channel.account_id(),
                error = %e,
                "Could not build envelope; transaction left in sending"
            );
            return Outcome::ConstructionFailed;
        }
    };

    let hash = envelope.hash().to_hex();
    let sequence = envelope.sequence();
    if let Err(e) = shared.queue.record_hash(tx_id, &hash).await {
        shared.metrics.hash_record_failures.inc();
        error!(
            tx_id,
            channel = %channel.account_id(),
            sequence,
            error = %e,
            "Could not record hash; not submitting"
        );
        // The envelope never left the process, so its sequence is still free on the ledger
        if !channel.release_sequence_number(sequence) {
            error!(
                channel = %channel.account_id(),
                sequence,
                "Sequence reserved elsewhere; channel is ahead of the ledger"
            );
        }
        return Outcome::HashNotRecorded;
    }

    let opts = SubmitOptions {
        skip_memo_required_check: true,
    };
    let timer = shared.metrics.submit_duration.start_timer();
    let submitted = shared.gateway.submit_transaction(&envelope, opts).await;
    timer.observe_duration();

    let (outcome, finalized) = match submitted {
        Ok(result) => {
            info!(
                tx_id,
                channel = %channel.account_id(),
                sequence,
                hash = %hash,
                ledger = ?result.ledger,
                "Transaction sent"
            );
            (Outcome::Sent, shared.queue.finalize_success(tx_id).await)
        }
        Err(e) => {
            warn!(
                tx_id,
                channel = %channel.account_id(),
                sequence,
                hash = %hash,
                result_code = ?e.result_code(),
                error = %e,
                "Submission failed"
            );
            (Outcome::Failed, shared.queue.finalize_error(tx_id).await)
        }
    };

    shared.metrics.record_submission(outcome == Outcome::Sent);
    if let Err(e) = finalized {
        shared.metrics.finalize_failures.inc();
        error!(tx_id, hash = %hash, error = %e, "Could not finalize transaction");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use channel_pool::Channel;
    use ledger_core::{Asset, KeyPair, MockGateway, NetworkId};
    use tx_queue::{MemoryQueue, NewTransaction};

    struct Fixture {
        queue: Arc<MemoryQueue>,
        gateway: Arc<MockGateway>,
        shared: Shared,
        channel: LoadedChannel,
    }

    async fn fixture() -> Fixture {
        let queue = Arc::new(MemoryQueue::new());
        let channel_key = KeyPair::from_seed(&[2; 32]);
        let gateway = Arc::new(MockGateway::new().with_account(channel_key.account_id(), 100));
        let channel = Channel::from_keypair(channel_key)
            .load_state(gateway.as_ref())
            .await
            .unwrap();
        let shared = Shared {
            queue: queue.clone(),
            gateway: gateway.clone(),
            builder: EnvelopeBuilder::new(
                NetworkId::from_passphrase("Test Network"),
                KeyPair::from_seed(&[1; 32]),
                Asset::Native,
                100,
            ),
            metrics: Arc::new(DispatcherMetrics::new().unwrap()),
        };
        Fixture {
            queue,
            gateway,
            shared,
            channel,
        }
    }

    async fn claim_one(queue: &MemoryQueue, amount: &str) -> TransactionRecord {
        queue
            .enqueue(NewTransaction::new("ext", "ACCT_B", amount))
            .await
            .unwrap();
        queue.claim_pending(1).await.unwrap().remove(0)
    }

    #[tokio::test]
    async fn test_process_success() {
        let f = fixture().await;
        let record = claim_one(&f.queue, "20").await;

        let outcome = process(&f.shared, &f.channel, record.clone()).await;
        assert_eq!(outcome, Outcome::Sent);

        let row = f.queue.get(record.id).await.unwrap();
        assert_eq!(row.state, TxState::Sent);
        let submitted = &f.gateway.submissions()[0];
        assert_eq!(row.hash, Some(submitted.hash().to_hex()));
        assert_eq!(f.shared.metrics.submissions("sent"), 1);
    }

    #[tokio::test]
    async fn test_process_rejection() {
        let f = fixture().await;
        f.gateway.reject_submissions("tx_insufficient_balance");
        let record = claim_one(&f.queue, "20").await;

        assert_eq!(process(&f.shared, &f.channel, record.clone()).await, Outcome::Failed);
        let row = f.queue.get(record.id).await.unwrap();
        assert_eq!(row.state, TxState::Error);
        assert!(row.hash.is_some());
        assert_eq!(f.shared.metrics.submissions("error"), 1);
    }

    #[tokio::test]
    async fn test_process_construction_failure() {
        let f = fixture().await;
        let record = claim_one(&f.queue, "twenty").await;

        assert_eq!(
            process(&f.shared, &f.channel, record.clone()).await,
            Outcome::ConstructionFailed
        );
        let row = f.queue.get(record.id).await.unwrap();
        assert_eq!(row.state, TxState::Sending);
        assert!(row.hash.is_none());
        assert!(f.gateway.submissions().is_empty());
        assert_eq!(f.channel.current_sequence(), 100);
    }

    #[tokio::test]
    async fn test_process_skips_rows_not_sending() {
        let f = fixture().await;
        let record = claim_one(&f.queue, "20").await;
        f.queue.record_hash(record.id, "ab").await.unwrap();
        f.queue.finalize_error(record.id).await.unwrap();

        assert_eq!(process(&f.shared, &f.channel, record).await, Outcome::Skipped);
        assert!(f.gateway.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_process_aborts_when_hash_not_recorded() {
        let f = fixture().await;
        let record = claim_one(&f.queue, "20").await;
        // A stale hash blocks the checkpoint
        f.queue.record_hash(record.id, "stale").await.unwrap();

        assert_eq!(
            process(&f.shared, &f.channel, record.clone()).await,
            Outcome::HashNotRecorded
        );
        assert!(f.gateway.submissions().is_empty());
        assert_eq!(f.queue.get(record.id).await.unwrap().state, TxState::Sending);
        assert_eq!(f.shared.metrics.hash_record_failures.get(), 1);
        assert_eq!(f.channel.current_sequence(), 100);

        // The lane still matches the ledger
        let next = claim_one(&f.queue, "5").await;
        assert_eq!(process(&f.shared, &f.channel, next).await, Outcome::Sent);
        assert_eq!(f.gateway.submissions()[0].sequence(), 101);
    }
}
