//! Pool of loaded channels

use crate::channel::{Channel, LoadedChannel};
use crate::error::{PoolError, Result};
use ledger_core::LedgerGateway;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Fixed set of loaded channels
#[derive(Debug, Clone)]
pub struct ChannelPool {
    channels: Vec<Arc<LoadedChannel>>,
}

impl ChannelPool {
    /// Load every channel, one after another, stopping at the first failure.
    pub async fn load(channels: Vec<Channel>, gateway: &dyn LedgerGateway) -> Result<Self> {
        if channels.is_empty() {
            return Err(PoolError::EmptyPool);
        }

        let mut seen = HashSet::with_capacity(channels.len());
        for channel in &channels {
            if !seen.insert(channel.account_id().clone()) {
                return Err(PoolError::DuplicateChannel(channel.account_id().clone()));
            }
        }

        let mut loaded = Vec::with_capacity(channels.len());
        for channel in channels {
            loaded.push(Arc::new(channel.load_state(gateway).await?));
        }

        info!(channels = loaded.len(), "Channel pool loaded");
        Ok(Self { channels: loaded })
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Always false for a loaded pool
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Loaded channels in configuration order
    pub fn channels(&self) -> &[Arc<LoadedChannel>] {
        &self.channels
    }

    /// Iterate over the channels
    pub fn iter(&self) -> impl Iterator<Item = &Arc<LoadedChannel>> {
        self.channels.iter()
    }
}
