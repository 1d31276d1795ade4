//! Dispatcher binary

use anyhow::Context;
use channel_pool::Channel;
use dispatcher::{Config, Dispatcher, DispatcherMetrics, EnvelopeBuilder};
use ledger_core::{HttpGateway, KeyPair, NetworkId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tx_queue::{PgQueue, TransactionQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting transaction dispatcher");

    // Load configuration
    let config = match std::env::var("DISPATCHER_CONFIG") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("reading {}", path))?,
        Err(_) => Config::from_env()?,
    };
    config.validate()?;

    let queue = PgQueue::connect(config.database.url.expose(), config.database.max_connections)
        .await
        .context("connecting to the queue database")?;
    queue.ensure_schema().await?;

    let counts = queue.count_by_state().await?;
    tracing::info!(
        pending = counts.pending,
        sending = counts.sending,
        sent = counts.sent,
        error = counts.error,
        "Queue state"
    );

    let gateway = HttpGateway::new(config.gateway.url.clone(), config.gateway.timeout())?;
    let funding = KeyPair::from_seed_hex(config.signers.funding_seed.expose())
        .context("parsing funding seed")?;
    let channels = config
        .signers
        .channel_seeds
        .iter()
        .map(|seed| Channel::from_seed(seed.expose()))
        .collect::<Result<Vec<_>, _>>()
        .context("parsing channel seeds")?;

    let builder = EnvelopeBuilder::new(
        NetworkId::from_passphrase(&config.network.passphrase),
        funding,
        config.network.asset()?,
        config.network.base_fee,
    );
    let metrics = Arc::new(DispatcherMetrics::new()?);

    let dispatcher = Dispatcher::new(
        Arc::new(queue),
        Arc::new(gateway),
        builder,
        metrics.clone(),
        config.dispatch.poll_interval(),
    );

    let cancel = CancellationToken::new();
    let handle = dispatcher
        .start(channels, cancel)
        .await
        .context("loading channel accounts")?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down; draining claimed transactions");

    handle.shutdown().await?;
    tracing::debug!(metrics = %metrics.render()?, "Final metrics");
    Ok(())
}
