//! Append-only event ledger (spec §4.2).
//!
//! The ledger is the source of truth: every lease/payment state change is
//! represented first as a `LedgerEntry`, and derived state is rebuilt from
//! it by `reconstructor::fold`. There is deliberately no `update`/`delete`
//! method — callers that need one get `Error::ImmutableLedger`.

use crate::{
    error::{Error, Result},
    storage::Storage,
    types::{EventType, LedgerEntry},
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// High-level ledger API over `Storage`.
pub struct Ledger {
    storage: Arc<Storage>,
}

impl Ledger {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Append a new entry, assigning it the next sequence number.
    pub fn append(
        &self,
        lease_id: Uuid,
        event_type: EventType,
        payload: serde_json::Value,
        amount: Option<Decimal>,
    ) -> Result<LedgerEntry> {
        let entry = LedgerEntry {
            sequence_number: self.storage.next_sequence_number(),
            lease_id,
            event_type,
            payload,
            amount,
            timestamp: Utc::now(),
        };
        self.storage.append_ledger_entry(&entry)?;

        tracing::info!(
            lease_id = %lease_id,
            event_type = ?event_type,
            seq = entry.sequence_number,
            "ledger entry recorded"
        );

        Ok(entry)
    }

    /// Full history for a lease, in sequence order.
    pub fn get_lease_history(&self, lease_id: Uuid) -> Result<Vec<LedgerEntry>> {
        self.storage.get_lease_history(lease_id)
    }

    /// All entries of a given event type across every lease.
    pub fn get_by_event_type(&self, event_type: EventType) -> Result<Vec<LedgerEntry>> {
        self.storage.get_ledger_entries_by_type(event_type)
    }

    /// Every entry ever appended. Intended for offline tooling and tests.
    pub fn get_all(&self) -> Result<Vec<LedgerEntry>> {
        self.storage.get_all_ledger_entries()
    }

    /// A single entry by sequence number.
    pub fn get(&self, sequence_number: u64) -> Result<LedgerEntry> {
        self.storage.get_ledger_entry(sequence_number)
    }

    /// The ledger is append-only. This exists to document the invariant
    /// and to give a clear error if some caller reaches for a mutation
    /// path that does not exist elsewhere in this API.
    pub fn update(&self, sequence_number: u64) -> Result<()> {
        Err(Error::ImmutableLedger(format!(
            "cannot modify ledger entry {}",
            sequence_number
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use tempfile::TempDir;

    fn test_ledger() -> (Ledger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Arc::new(Storage::open(&config).unwrap());
        (Ledger::new(storage), temp_dir)
    }

    #[test]
    fn append_assigns_sequential_numbers_and_preserves_order() {
        let (ledger, _tmp) = test_ledger();
        let lease_id = Uuid::now_v7();

        let e1 = ledger
            .append(lease_id, EventType::LeaseCreated, serde_json::json!({}), None)
            .unwrap();
        let e2 = ledger
            .append(
                lease_id,
                EventType::PaymentScheduled,
                serde_json::json!({}),
                None,
            )
            .unwrap();

        assert_eq!(e2.sequence_number, e1.sequence_number + 1);

        let history = ledger.get_lease_history(lease_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sequence_number, e1.sequence_number);
        assert_eq!(history[1].sequence_number, e2.sequence_number);
    }

    #[test]
    fn get_by_event_type_spans_leases() {
        let (ledger, _tmp) = test_ledger();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();

        ledger
            .append(a, EventType::LeaseCreated, serde_json::json!({}), None)
            .unwrap();
        ledger
            .append(b, EventType::LeaseCreated, serde_json::json!({}), None)
            .unwrap();
        ledger
            .append(a, EventType::PaymentScheduled, serde_json::json!({}), None)
            .unwrap();

        let created = ledger.get_by_event_type(EventType::LeaseCreated).unwrap();
        assert_eq!(created.len(), 2);
    }

    #[test]
    fn update_is_rejected() {
        let (ledger, _tmp) = test_ledger();
        let lease_id = Uuid::now_v7();
        let entry = ledger
            .append(lease_id, EventType::LeaseCreated, serde_json::json!({}), None)
            .unwrap();

        let result = ledger.update(entry.sequence_number);
        assert!(matches!(result, Err(Error::ImmutableLedger(_))));
    }
}
