//! Event persister (spec §4.10): the single choke point every component
//! goes through to append a ledger entry, so the amount-extraction rule
//! and logging density stay consistent regardless of caller.

use crate::{ledger::Ledger, types::EventType, Result};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Appends a ledger entry for `lease_id`/`event_type` with `payload`,
/// extracting the entry's `amount` column from the payload by priority:
/// `principalAmount`, then `amount`, then `totalPaid` — whichever is
/// present first. Grounded on
/// `original_source/shared/event_persistence.py`'s extraction order.
pub fn persist_event(
    ledger: &Ledger,
    lease_id: Uuid,
    event_type: EventType,
    payload: serde_json::Value,
) -> Result<crate::types::LedgerEntry> {
    let amount = extract_amount(&payload);
    ledger.append(lease_id, event_type, payload, amount)
}

/// Convenience wrapper for callers holding an `Arc<Ledger>`.
pub fn persist_event_arc(
    ledger: &Arc<Ledger>,
    lease_id: Uuid,
    event_type: EventType,
    payload: serde_json::Value,
) -> Result<crate::types::LedgerEntry> {
    persist_event(ledger, lease_id, event_type, payload)
}

fn extract_amount(payload: &serde_json::Value) -> Option<Decimal> {
    for field in ["principalAmount", "amount", "totalPaid"] {
        if let Some(value) = payload.get(field) {
            if let Some(decimal) = decimal_from_json(value) {
                return Some(decimal);
            }
        }
    }
    None
}

fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    if let Some(s) = value.as_str() {
        return Decimal::from_str(s).ok();
    }
    if let Some(f) = value.as_f64() {
        return Decimal::from_str(&f.to_string()).ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{storage::Storage, Config};
    use tempfile::TempDir;

    fn test_ledger() -> (Ledger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Arc::new(Storage::open(&config).unwrap());
        (Ledger::new(storage), temp_dir)
    }

    #[test]
    fn prefers_principal_amount_over_amount_and_total_paid() {
        let payload = serde_json::json!({
            "principalAmount": "5000.00",
            "amount": "1.00",
            "totalPaid": "2.00",
        });
        assert_eq!(extract_amount(&payload), Some(Decimal::new(500000, 2)));
    }

    #[test]
    fn falls_back_to_amount_then_total_paid() {
        let only_amount = serde_json::json!({"amount": "42.00"});
        assert_eq!(extract_amount(&only_amount), Some(Decimal::new(4200, 2)));

        let only_total_paid = serde_json::json!({"totalPaid": "99.00"});
        assert_eq!(
            extract_amount(&only_total_paid),
            Some(Decimal::new(9900, 2))
        );
    }

    #[test]
    fn persist_event_writes_extracted_amount_onto_the_entry() {
        let (ledger, _tmp) = test_ledger();
        let lease_id = Uuid::now_v7();
        let entry = persist_event(
            &ledger,
            lease_id,
            EventType::PaymentSucceeded,
            serde_json::json!({"amount": "300.00"}),
        )
        .unwrap();

        assert_eq!(entry.amount, Some(Decimal::new(30000, 2)));
    }
}
