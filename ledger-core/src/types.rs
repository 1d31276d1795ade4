//! Core types shared across the submission pipeline
//!
//! All types are designed for:
//! - Deterministic serialization (bincode) so hashes are stable
//! - Exact arithmetic (Decimal for amounts)

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ledger account identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset moved by a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Asset {
    /// The ledger's native asset
    Native,
    /// Issued asset
    Credit {
        /// Asset code (1-12 alphanumeric characters)
        code: String,
        /// Issuing account
        issuer: AccountId,
    },
}

impl Asset {
    /// Issued asset with validation of the code
    pub fn credit(code: impl Into<String>, issuer: AccountId) -> Result<Self> {
        let code = code.into();
        if code.is_empty() || code.len() > 12 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidEnvelope(format!("invalid asset code '{}'", code)));
        }
        Ok(Asset::Credit { code, issuer })
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Credit { code, issuer } => write!(f, "{}:{}", code, issuer),
        }
    }
}

/// Maximum number of fractional digits the ledger accepts for amounts
pub const AMOUNT_SCALE: u32 = 7;

/// Parse a payment amount
///
/// Amounts must be strictly positive and carry at most seven fractional digits.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|e| Error::InvalidAmount(format!("'{}': {}", raw, e)))?;

    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(format!("'{}' must be positive", raw)));
    }

    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(Error::InvalidAmount(format!(
            "'{}' has more than {} decimal places",
            raw, AMOUNT_SCALE
        )));
    }

    Ok(amount.normalize())
}

/// Signature tagged with the last four bytes of the signer's public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedSignature {
    /// Signer hint
    pub hint: [u8; 4],
    /// Ed25519 signature bytes
    pub signature: Vec<u8>,
}

/// 32-byte transaction hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Wrap raw hash bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form, as stored in the queue
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for TxHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| Error::InvalidEnvelope(format!("invalid hash '{}': {}", s, e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidEnvelope(format!("hash '{}' is not 32 bytes", s)))?;
        Ok(Self(bytes))
    }
}
