//! Payment and fee-bump envelopes
//!
//! A [`PaymentTransaction`] moves an asset out of the funding account. It is wrapped in a
//! [`FeeBumpTransaction`] whose fee source is a channel account: the channel pays the fee and
//! consumes one of its sequence numbers, so it never needs to hold the transferred asset.
//!
//! Hashes are `SHA-256(network_id || envelope_type || canonical_bytes)`.

use crate::crypto::{hash_bytes, KeyPair, NetworkId};
use crate::types::{AccountId, Asset, DecoratedSignature, TxHash};
use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Envelope type tag for a plain transaction
const ENVELOPE_TYPE_TX: u32 = 2;

/// Envelope type tag for a fee-bump transaction
const ENVELOPE_TYPE_FEE_BUMP: u32 = 5;

/// Inner transaction: a single payment from the funding account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    /// Funding account the asset leaves from
    pub source: AccountId,
    /// Receiving account
    pub destination: AccountId,
    /// Asset transferred
    pub asset: Asset,
    /// Amount transferred
    pub amount: Decimal,
    /// Fee bid of the inner transaction
    pub fee: u32,
}

impl PaymentTransaction {
    /// Canonical bytes used for hashing
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Network-bound hash of the inner transaction
    pub fn hash(&self, network: &NetworkId) -> Result<TxHash> {
        Ok(tagged_hash(network, ENVELOPE_TYPE_TX, &self.canonical_bytes()?))
    }

    /// Sign with the funding key
    pub fn sign(self, network: &NetworkId, funding: &KeyPair) -> Result<SignedPayment> {
        if funding.account_id() != self.source {
            return Err(Error::InvalidEnvelope(format!(
                "payment source {} is not the signing account {}",
                self.source,
                funding.account_id()
            )));
        }
        let hash = self.hash(network)?;
        let signature = funding.sign_decorated(hash.as_bytes());
        Ok(SignedPayment {
            tx: self,
            signatures: vec![signature],
        })
    }
}

/// Inner transaction with its signatures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayment {
    /// Payment body
    pub tx: PaymentTransaction,
    /// Signatures over the inner hash
    pub signatures: Vec<DecoratedSignature>,
}

/// Outer fee-bump transaction sourced by a channel account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBumpTransaction {
    /// Channel account paying the fee
    pub fee_source: AccountId,
    /// Channel sequence number consumed by this envelope
    pub sequence: i64,
    /// Total fee bid
    pub fee: i64,
    /// Wrapped payment
    pub inner: SignedPayment,
}

impl FeeBumpTransaction {
    /// Wrap a signed payment
    ///
    /// The outer fee must at least cover the inner fee for both operations
    /// (the payment and the bump itself).
    pub fn new(
        fee_source: AccountId,
        sequence: i64,
        base_fee: u32,
        inner: SignedPayment,
    ) -> Result<Self> {
        if sequence <= 0 {
            return Err(Error::InvalidEnvelope(format!(
                "sequence {} must be positive",
                sequence
            )));
        }
        let fee = i64::from(base_fee) * 2;
        if fee < i64::from(inner.tx.fee) {
            return Err(Error::InvalidEnvelope(format!(
                "outer fee {} is lower than inner fee {}",
                fee, inner.tx.fee
            )));
        }
        Ok(Self {
            fee_source,
            sequence,
            fee,
            inner,
        })
    }

    /// Canonical bytes used for hashing
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Network-bound hash of the fee-bump transaction
    pub fn hash(&self, network: &NetworkId) -> Result<TxHash> {
        Ok(tagged_hash(network, ENVELOPE_TYPE_FEE_BUMP, &self.canonical_bytes()?))
    }

    /// Sign with the channel key
    pub fn sign(self, network: &NetworkId, channel: &KeyPair) -> Result<SignedEnvelope> {
        if channel.account_id() != self.fee_source {
            return Err(Error::InvalidEnvelope(format!(
                "fee source {} is not the signing account {}",
                self.fee_source,
                channel.account_id()
            )));
        }
        let hash = self.hash(network)?;
        let signature = channel.sign_decorated(hash.as_bytes());
        Ok(SignedEnvelope {
            tx: self,
            signatures: vec![signature],
            hash,
        })
    }
}

/// Fully signed fee-bump envelope, ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    /// Fee-bump body
    pub tx: FeeBumpTransaction,
    /// Signatures over the outer hash
    pub signatures: Vec<DecoratedSignature>,
    /// Outer hash (the submission's identity on the ledger)
    hash: TxHash,
}

impl SignedEnvelope {
    /// Outer hash
    pub fn hash(&self) -> TxHash {
        self.hash
    }

    /// Channel sequence consumed by this envelope
    pub fn sequence(&self) -> i64 {
        self.tx.sequence
    }

    /// Base64 wire form submitted to the gateway
    pub fn to_base64(&self) -> Result<String> {
        let bytes = bincode::serialize(&(&self.tx, &self.signatures))?;
        Ok(BASE64.encode(bytes))
    }

    /// Decode the wire form, recomputing the hash for `network`
    pub fn from_base64(encoded: &str, network: &NetworkId) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| Error::InvalidEnvelope(format!("invalid base64: {}", e)))?;
        let (tx, signatures): (FeeBumpTransaction, Vec<DecoratedSignature>) =
            bincode::deserialize(&bytes)?;
        let hash = tx.hash(network)?;
        Ok(Self { tx, signatures, hash })
    }
}

fn tagged_hash(network: &NetworkId, envelope_type: u32, body: &[u8]) -> TxHash {
    let mut preimage = Vec::with_capacity(32 + 4 + body.len());
    preimage.extend_from_slice(network.as_bytes());
    preimage.extend_from_slice(&envelope_type.to_be_bytes());
    preimage.extend_from_slice(body);
    TxHash::from_bytes(hash_bytes(&preimage))
}
