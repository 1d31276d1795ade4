//! Channel pool
//!
//! A fixed set of signing identities ("channels"). Each channel is an independent
//! sequence-number lane: the ledger only accepts transactions from an account in strict
//! sequence order, so parallel submission needs one account per lane.
//!
//! A [`Channel`] has no sequence until it is loaded from the ledger. Loading consumes it and
//! yields a [`LoadedChannel`], the only type that can hand out sequence numbers:
//!
//! ```text
//! Channel::from_seed ──load_state(gateway)──▶ LoadedChannel ──next_sequence_number()──▶ N+1, N+2, ...
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod channel;
pub mod error;
pub mod pool;

// Re-exports
pub use channel::{Channel, LoadedChannel};
pub use error::{PoolError, Result};
pub use pool::ChannelPool;
