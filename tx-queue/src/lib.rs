//! Durable transaction queue
//!
//! Work queue of outgoing ledger transactions, backed by PostgreSQL. The table is the
//! single source of truth for transaction state.
//!
//! # Lifecycle
//!
//! ```text
//!  producer        claim_pending        finalize_success
//!  ───────▶ pending ───────────▶ sending ───────────────▶ sent
//!                                   │
//!                                   │ finalize_error
//!                                   └──────────────────▶ error
//! ```
//!
//! # Invariants
//!
//! - Transitions are one-directional; rows are never deleted
//! - A claimed row is owned by exactly one caller
//! - `hash` is written while the row is `sending`, before it can be finalized

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod error;
pub mod memory;
pub mod postgres;
pub mod queue;
pub mod types;

// Re-exports
pub use error::{QueueError, Result};
pub use memory::MemoryQueue;
pub use postgres::PgQueue;
pub use queue::TransactionQueue;
pub use types::{NewTransaction, StateCounts, TransactionRecord, TxState};
