//! Polling loop and worker supervision

use crate::builder::EnvelopeBuilder;
use crate::metrics::DispatcherMetrics;
use crate::worker::{self, Relay, Shared};
use crate::Result;
use channel_pool::{Channel, ChannelPool};
use chrono::Utc;
use ledger_core::LedgerGateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tx_queue::{TransactionQueue, TransactionRecord};

/// Claims queued transactions and submits them through a pool of channels
#[derive(Debug)]
pub struct Dispatcher {
    shared: Arc<Shared>,
    poll_interval: Duration,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(
        queue: Arc<dyn TransactionQueue>,
        gateway: Arc<dyn LedgerGateway>,
        builder: EnvelopeBuilder,
        metrics: Arc<DispatcherMetrics>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue,
                gateway,
                builder,
                metrics,
            }),
            poll_interval,
        }
    }

    /// Load the channels and spawn the poller and one worker per channel.
    ///
    /// Fails if any channel cannot be loaded; nothing is spawned in that case.
    pub async fn start(
        self,
        channels: Vec<Channel>,
        cancel: CancellationToken,
    ) -> Result<DispatcherHandle> {
        let pool = ChannelPool::load(channels, self.shared.gateway.as_ref()).await?;
        self.report_stuck_rows().await;

        let (sender, receiver) = mpsc::channel(pool.len());
        let relay: Relay = Arc::new(Mutex::new(receiver));

        let workers = pool
            .iter()
            .map(|channel| {
                tokio::spawn(worker::run(
                    channel.clone(),
                    relay.clone(),
                    self.shared.clone(),
                ))
            })
            .collect();

        let poller = tokio::spawn(poll_loop(
            self.shared.queue.clone(),
            self.shared.metrics.clone(),
            sender,
            self.poll_interval,
            cancel.clone(),
        ));

        info!(
            channels = pool.len(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Dispatcher started"
        );

        Ok(DispatcherHandle {
            cancel,
            poller,
            workers,
        })
    }

    /// Start and wait until `cancel` fires and every worker has drained.
    pub async fn run(self, channels: Vec<Channel>, cancel: CancellationToken) -> Result<()> {
        self.start(channels, cancel).await?.join().await
    }

    /// Rows left in `sending` by an earlier process need an operator: their submission may or
    /// may not have reached the ledger.
    async fn report_stuck_rows(&self) {
        match self.shared.queue.list_sending_before(Utc::now()).await {
            Ok(rows) if rows.is_empty() => {}
            Ok(rows) => {
                warn!(count = rows.len(), "Transactions left in sending by a previous run");
                for row in rows {
                    warn!(
                        tx_id = row.id,
                        external_id = %row.external_id,
                        hash = ?row.hash,
                        sending_at = ?row.sending_at,
                        "Stuck in sending; check the ledger by hash before resolving"
                    );
                }
            }
            Err(e) => warn!(error = %e, "Could not list transactions stuck in sending"),
        }
    }
}

/// Handle to a running dispatcher
#[derive(Debug)]
pub struct DispatcherHandle {
    cancel: CancellationToken,
    poller: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl DispatcherHandle {
    /// Stop polling. Rows already in the relay are still processed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the poller and every worker to exit
    pub async fn join(self) -> Result<()> {
        self.poller.await?;
        for worker in self.workers {
            worker.await?;
        }
        info!("Dispatcher stopped");
        Ok(())
    }

    /// Cancel and wait for the workers to drain
    pub async fn shutdown(self) -> Result<()> {
        self.cancel();
        self.join().await
    }
}

async fn poll_loop(
    queue: Arc<dyn TransactionQueue>,
    metrics: Arc<DispatcherMetrics>,
    sender: mpsc::Sender<TransactionRecord>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let max = sender.max_capacity();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let free = sender.capacity();
        metrics.relay_depth.set((max - free) as i64);
        if free == 0 {
            continue;
        }

        let rows = match queue.claim_pending(free).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Claim failed; retrying next tick");
                continue;
            }
        };
        if rows.is_empty() {
            continue;
        }

        debug!(count = rows.len(), "Claimed transactions");
        metrics.record_claimed(rows.len());
        for row in rows {
            let tx_id = row.id;
            if sender.send(row).await.is_err() {
                // Only possible if every worker is gone
                warn!(tx_id, "Relay closed; claimed transaction left in sending");
                return;
            }
        }
    }

    // Dropping the sender lets workers finish the relay and exit
    drop(sender);
    info!("Polling stopped");
}
