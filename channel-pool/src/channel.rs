//! Signing channels and their sequence counters

use crate::error::{PoolError, Result};
use ledger_core::{
    AccountId, FeeBumpTransaction, KeyPair, LedgerGateway, NetworkId, SignedEnvelope,
};
use parking_lot::Mutex;
use tracing::info;

/// A channel identity whose ledger state has not been read yet
#[derive(Debug)]
pub struct Channel {
    keypair: KeyPair,
    account_id: AccountId,
}

impl Channel {
    /// Parse a hex-encoded ed25519 seed
    pub fn from_seed(seed: &str) -> Result<Self> {
        Ok(Self::from_keypair(KeyPair::from_seed_hex(seed)?))
    }

    /// Wrap an existing key pair
    pub fn from_keypair(keypair: KeyPair) -> Self {
        let account_id = keypair.account_id();
        Self {
            keypair,
            account_id,
        }
    }

    /// Account derived from the seed
    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// Read the account's current sequence from the ledger.
    ///
    /// Queries the gateway once. The reported account must be the one derived from the seed.
    pub async fn load_state(self, gateway: &dyn LedgerGateway) -> Result<LoadedChannel> {
        let detail = gateway.account_detail(&self.account_id).await?;
        if detail.account_id != self.account_id {
            return Err(PoolError::AccountMismatch {
                expected: self.account_id,
                reported: detail.account_id,
            });
        }

        info!(
            channel = %self.account_id,
            sequence = detail.sequence,
            "Loaded channel"
        );

        Ok(LoadedChannel {
            keypair: self.keypair,
            account_id: self.account_id,
            sequence: Mutex::new(detail.sequence),
        })
    }
}

/// A channel with a cached sequence number, ready to sign
#[derive(Debug)]
pub struct LoadedChannel {
    keypair: KeyPair,
    account_id: AccountId,
    /// Last sequence number handed out (or read from the ledger)
    sequence: Mutex<i64>,
}

impl LoadedChannel {
    /// Channel account
    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// Reserve the next sequence number.
    ///
    /// Every call returns a distinct value, one greater than the previous call on this channel.
    /// A reserved number is handed out again only after [`release_sequence_number`] returns it.
    ///
    /// [`release_sequence_number`]: LoadedChannel::release_sequence_number
    pub fn next_sequence_number(&self) -> Result<i64> {
        let mut sequence = self.sequence.lock();
        let next = sequence
            .checked_add(1)
            .ok_or_else(|| PoolError::SequenceOverflow(self.account_id.clone()))?;
        *sequence = next;
        Ok(next)
    }

    /// Give back a reservation whose envelope never left the process.
    ///
    /// Only the most recent reservation can be returned. If another number was reserved since,
    /// the counter is left alone and `false` is returned.
    pub fn release_sequence_number(&self, sequence: i64) -> bool {
        let mut current = self.sequence.lock();
        if *current != sequence {
            return false;
        }
        *current = sequence - 1;
        true
    }

    /// Last sequence number reserved
    pub fn current_sequence(&self) -> i64 {
        *self.sequence.lock()
    }

    /// Sign a fee-bump envelope sourced by this channel
    pub fn sign(&self, tx: FeeBumpTransaction, network: &NetworkId) -> Result<SignedEnvelope> {
        Ok(tx.sign(network, &self.keypair)?)
    }
}
