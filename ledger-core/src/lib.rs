//! Ledger primitives shared by the submission pipeline
//!
//! Signing identities, account ids, the payment / fee-bump envelope model and the
//! gateway contract used to read account state and submit signed envelopes.
//!
//! # Envelope shape
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ FeeBumpTransaction  (fee source = channel)     │
//! │   sequence, fee                                │
//! │  ┌─────────────────────────────────────────┐   │
//! │  │ PaymentTransaction (source = funding)   │   │
//! │  │   destination, asset, amount            │   │
//! │  └─────────────────────────────────────────┘   │
//! │   inner signatures: funding                    │
//! └───────────────────────────────────────────────┘
//!   outer signatures: channel
//! ```
//!
//! The hash recorded for a submission is always the outer (fee-bump) hash.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod mock;
pub mod types;

// Re-exports
pub use crypto::{KeyPair, NetworkId};
pub use envelope::{FeeBumpTransaction, PaymentTransaction, SignedEnvelope, SignedPayment};
pub use error::{Error, Result};
pub use gateway::{AccountDetail, HttpGateway, LedgerGateway, SubmitOptions, SubmitResult};
pub use mock::MockGateway;
pub use types::{AccountId, Asset, DecoratedSignature, TxHash};
