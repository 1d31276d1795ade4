//! Envelope construction for claimed rows

use crate::Result;
use channel_pool::LoadedChannel;
use ledger_core::types::parse_amount;
use ledger_core::{
    AccountId, Asset, Error as LedgerError, FeeBumpTransaction, KeyPair, NetworkId,
    PaymentTransaction, SignedEnvelope, SignedPayment,
};
use tx_queue::TransactionRecord;

/// Builds signed fee-bump envelopes paying out of the funding account
#[derive(Debug)]
pub struct EnvelopeBuilder {
    network: NetworkId,
    funding: KeyPair,
    asset: Asset,
    base_fee: u32,
}

impl EnvelopeBuilder {
    /// Create a builder
    pub fn new(network: NetworkId, funding: KeyPair, asset: Asset, base_fee: u32) -> Self {
        Self {
            network,
            funding,
            asset,
            base_fee,
        }
    }

    /// Network the envelopes are bound to
    pub fn network(&self) -> &NetworkId {
        &self.network
    }

    /// Funding account
    pub fn funding_account(&self) -> AccountId {
        self.funding.account_id()
    }

    /// Build and sign the envelope for `record` on `channel`.
    ///
    /// Everything that depends only on the row is validated and signed before the channel's
    /// sequence is touched, so a malformed row does not consume a sequence number.
    pub fn build(
        &self,
        record: &TransactionRecord,
        channel: &LoadedChannel,
    ) -> Result<SignedEnvelope> {
        let destination = record.destination.trim();
        if destination.is_empty() {
            return Err(LedgerError::InvalidEnvelope(format!(
                "transaction {} has no destination",
                record.id
            ))
            .into());
        }

        let payment = PaymentTransaction {
            source: self.funding.account_id(),
            destination: AccountId::new(destination),
            asset: self.asset.clone(),
            amount: parse_amount(&record.amount)?,
            fee: self.base_fee,
        };
        let inner = payment.sign(&self.network, &self.funding)?;

        let sequence = channel.next_sequence_number()?;
        self.fee_bump(channel, sequence, inner).map_err(|e| {
            channel.release_sequence_number(sequence);
            e
        })
    }

    fn fee_bump(
        &self,
        channel: &LoadedChannel,
        sequence: i64,
        inner: SignedPayment,
    ) -> Result<SignedEnvelope> {
        let bump = FeeBumpTransaction::new(
            channel.account_id().clone(),
            sequence,
            self.base_fee,
            inner,
        )?;
        Ok(channel.sign(bump, &self.network)?)
    }
}
