//! Core data model: leases, payment schedules, ledger entries, idempotency
//! keys, and the projection the reconstructor folds from ledger history
//! (see spec §3).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lease lifecycle status. `Completed` and `Defaulted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaseStatus {
    Pending,
    Active,
    Completed,
    Defaulted,
}

impl LeaseStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, LeaseStatus::Completed | LeaseStatus::Defaulted)
    }
}

/// A lease: the aggregate root of the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: LeaseStatus,
    pub principal_amount: Decimal,
    pub term_months: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single scheduled installment's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
}

/// One installment of a lease's payment schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSchedule {
    pub id: Uuid,
    pub lease_id: Uuid,
    pub installment_number: u32,
    pub due_date: DateTime<Utc>,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub retry_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Recognized ledger event types (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    LeaseCreated,
    PaymentScheduled,
    PaymentAttempted,
    PaymentSucceeded,
    PaymentFailed,
    LeaseCompleted,
    LeaseDefaulted,
}

/// An append-only ledger entry. `sequence_number` is assigned monotonically
/// by the ledger on append and is the sole ordering authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sequence_number: u64,
    pub lease_id: Uuid,
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub amount: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

/// A recorded idempotency key and, once the operation completes, its cached
/// response. See `idempotency.rs` for the check-and-store semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyKey {
    pub key: String,
    pub operation: String,
    pub response_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A point-in-time projection of a lease's state folded from its ledger
/// history (see `reconstructor.rs`). Distinct from `Lease` because it
/// carries derived counters the stored row does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseProjection {
    pub lease_id: Uuid,
    pub customer_id: Uuid,
    pub status: LeaseStatus,
    pub principal_amount: Decimal,
    pub term_months: u32,
    /// Running value from the last `PAYMENT_SUCCEEDED` event's amount.
    ///
    /// Mirrors a documented quirk in the source system: each
    /// `PAYMENT_SUCCEEDED` event overwrites this field with its own
    /// payload amount rather than accumulating onto it. Callers needing
    /// the true cumulative paid amount should sum `PaymentSchedule` rows
    /// with `status == Paid` instead.
    pub total_paid: Decimal,
    pub paid_installments: u32,
    pub failed_attempts: u32,
    pub event_count: u64,
}
