//! Lease lifecycle & payment orchestration core.
//!
//! Event-sourced lease state machine with retry-driven payment
//! execution: every state change is appended to an immutable ledger
//! first, and all derived state — a lease's current status, how much of
//! it has been paid — is reconstructed from that ledger by folding.
//!
//! # Invariants
//!
//! - Deterministic replay: same ledger history -> same projection.
//! - Append-only: ledger entries are never modified or deleted.
//! - One writer per lease: concurrent operations on the same lease are
//!   strictly ordered; unrelated leases proceed independently.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod idempotency;
pub mod ledger;
pub mod lock;
pub mod metrics;
pub mod persister;
pub mod reconstructor;
pub mod retry;
pub mod scheduler;
pub mod state_machine;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use storage::Storage;
pub use types::{
    EventType, IdempotencyKey, Lease, LeaseProjection, LeaseStatus, LedgerEntry, PaymentSchedule,
    PaymentStatus,
};
