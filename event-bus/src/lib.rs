//! In-process event bus: topic-based publish/subscribe with typed event
//! envelopes, a handler registry keyed by event type, and a dead-letter
//! queue for handler failures.
//!
//! Not a durability boundary — callers persist to the ledger before
//! publishing; a subscriber that needs replay reads the ledger, not the
//! bus.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod bus;
pub mod dlq;
pub mod error;
pub mod metrics;
pub mod types;

pub use bus::{EventBus, Handler};
pub use dlq::{Dlq, DlqEntry};
pub use error::{Error, Result};
pub use types::{EventEnvelope, EVENTS_DLQ, LEASE_EVENTS, PAYMENT_EVENTS};
