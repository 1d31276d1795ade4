//! Transaction dispatcher
//!
//! Claims pending rows from the durable queue and submits them to the ledger through a pool of
//! channel accounts, one transaction per channel at a time.
//!
//! # Architecture
//!
//! ```text
//!                 claim_pending(free)            relay (capacity = channels)
//!  ┌──────────┐ ───────────────────▶ ┌────────┐ ─────────────────────────▶ ┌──────────┐
//!  │  queue   │                      │ poller │                            │ worker 1 │──┐
//!  │(postgres)│ ◀─────────────────── └────────┘                            │ worker 2 │──┤ gateway
//!  └──────────┘   record_hash / finalize_*                                 │ worker N │──┘
//!                        ▲                                                  └──────────┘
//!                        └──────────────────────────────────────────────────────┘
//! ```
//!
//! Per row a worker:
//! 1. re-reads the row and skips it unless it is still `sending`
//! 2. builds the inner payment, signs it with the funding key, takes the channel's next
//!    sequence and wraps the payment in a fee-bump envelope signed by the channel
//! 3. records the envelope hash (and stops if that fails)
//! 4. submits, then finalizes the row as `sent` or `error`

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod metrics;
mod worker;

// Re-exports
pub use builder::EnvelopeBuilder;
pub use config::{Config, Secret};
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use error::{DispatchError, Result};
pub use metrics::DispatcherMetrics;
