//! Property-based tests for core invariants.
//!
//! - Money conservation: a schedule's installments always sum to its
//!   principal, regardless of term length or rounding.
//! - Sequential numbering: ledger sequence numbers are strictly
//!   increasing with no gaps within a run.
//! - Backoff monotonicity: retry delay never decreases with attempt
//!   number (while still below the cap).
//! - Idempotency consistency: repeated `check_and_store` calls on the
//!   same key never regress from `Completed`/`InFlight` back to
//!   `Fresh`.

use lease_core::{
    config::RetryConfig,
    coordinator::LifecycleCoordinator,
    idempotency::{IdempotencyOutcome, IdempotencyStore},
    ledger::Ledger,
    lock::LeaseLockRegistry,
    persister::persist_event,
    retry::RetryEngine,
    scheduler,
    storage::Storage,
    types::{EventType, Lease, LeaseStatus, PaymentStatus},
    Config,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

fn principal_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn term_strategy() -> impl Strategy<Value = u32> {
    1u32..61u32
}

fn test_storage() -> (Arc<Storage>, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    (Arc::new(Storage::open(&config).unwrap()), temp_dir)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A generated schedule's installments always sum exactly to the
    /// requested principal, no matter how it divides.
    #[test]
    fn prop_schedule_conserves_principal(principal in principal_strategy(), term in term_strategy()) {
        let schedule = scheduler::generate(Uuid::now_v7(), principal, term, None).unwrap();
        let total: Decimal = schedule.iter().map(|p| p.amount).sum();
        prop_assert_eq!(total, principal);
        prop_assert_eq!(schedule.len() as u32, term);
    }

    /// Every installment amount is positive.
    #[test]
    fn prop_schedule_installments_are_positive(principal in principal_strategy(), term in term_strategy()) {
        let schedule = scheduler::generate(Uuid::now_v7(), principal, term, None).unwrap();
        for installment in &schedule {
            prop_assert!(installment.amount > Decimal::ZERO);
        }
    }

    /// Appending N entries to the ledger assigns sequence numbers
    /// 0..N with no gaps or repeats, in append order.
    #[test]
    fn prop_ledger_sequence_numbers_have_no_gaps(count in 1usize..50) {
        let (storage, _tmp) = test_storage();
        let ledger = Ledger::new(storage);
        let lease_id = Uuid::now_v7();

        let mut seen = Vec::new();
        for _ in 0..count {
            let entry = ledger
                .append(lease_id, EventType::PaymentScheduled, serde_json::json!({}), None)
                .unwrap();
            seen.push(entry.sequence_number);
        }

        for (i, seq) in seen.iter().enumerate() {
            prop_assert_eq!(*seq, i as u64);
        }
    }

    /// Retry delay strictly grows with the attempt number while the
    /// exponential backoff stays below the cap: jitter adds up to 10%
    /// of the base, and the 6x multiplier dwarfs that, so the next
    /// attempt's minimum possible delay still exceeds this attempt's
    /// maximum possible delay.
    #[test]
    fn prop_backoff_grows_with_attempt(attempt in 1u32..5u32) {
        let (storage, _tmp) = test_storage();
        let engine = RetryEngine::new(storage, RetryConfig::default());

        let this_attempt_max = (0..20).map(|_| engine.next_delay(attempt)).max().unwrap();
        let next_attempt_min = (0..20).map(|_| engine.next_delay(attempt + 1)).min().unwrap();
        prop_assert!(next_attempt_min > this_attempt_max);
    }
}

#[cfg(test)]
mod idempotency_consistency {
    use super::*;

    #[test]
    fn completed_outcome_never_regresses_to_fresh() {
        let (storage, _tmp) = test_storage();
        let store = IdempotencyStore::new(storage);

        store.check_and_store("k", "create_lease").unwrap();
        store
            .store_response("k", serde_json::json!({"ok": true}))
            .unwrap();

        for _ in 0..5 {
            let outcome = store.check_and_store("k", "create_lease").unwrap();
            assert_eq!(
                outcome,
                IdempotencyOutcome::Completed(serde_json::json!({"ok": true}))
            );
        }
    }

    #[test]
    fn in_flight_key_never_resolves_to_completed_without_a_stored_response() {
        let (storage, _tmp) = test_storage();
        let store = IdempotencyStore::new(storage);

        store.check_and_store("k", "create_lease").unwrap();
        for _ in 0..5 {
            let outcome = store.check_and_store("k", "create_lease").unwrap();
            assert_eq!(outcome, IdempotencyOutcome::InFlight);
        }
    }
}

/// End-to-end scenario coverage (spec §8's S1-S6): a lease moving
/// through creation, scheduling, activation, payment, and either
/// completion or default, driven entirely through the ledger and
/// replayed via `reconstructor::fold` rather than through any
/// in-memory shortcut.
#[cfg(test)]
mod integration_tests {
    use super::*;
    use lease_core::reconstructor;

    struct Harness {
        storage: Arc<Storage>,
        ledger: Arc<Ledger>,
        coordinator: LifecycleCoordinator,
        _tmp: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let (storage, _tmp) = test_storage();
        let ledger = Arc::new(Ledger::new(storage.clone()));
        let locks = Arc::new(LeaseLockRegistry::new());
        let coordinator = LifecycleCoordinator::new(storage.clone(), ledger.clone(), locks);
        Harness {
            storage,
            ledger,
            coordinator,
            _tmp,
        }
    }

    fn open_lease(h: &Harness, principal: Decimal, term: u32) -> Uuid {
        let lease_id = Uuid::now_v7();
        let customer_id = Uuid::now_v7();
        h.storage
            .put_lease(&Lease {
                id: lease_id,
                customer_id,
                status: LeaseStatus::Pending,
                principal_amount: principal,
                term_months: term,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            })
            .unwrap();
        persist_event(
            &h.ledger,
            lease_id,
            EventType::LeaseCreated,
            serde_json::json!({
                "customerId": customer_id.to_string(),
                "principalAmount": principal.to_string(),
                "termMonths": term,
            }),
        )
        .unwrap();
        lease_id
    }

    /// S1: a freshly created lease is Pending and has an empty
    /// projection until a schedule exists.
    #[tokio::test]
    async fn s1_lease_creation_starts_pending() {
        let h = harness();
        let lease_id = open_lease(&h, Decimal::new(120000, 2), 12);

        let history = h.ledger.get_lease_history(lease_id).unwrap();
        let projection = reconstructor::fold(&history, None).unwrap();
        assert_eq!(projection.status, LeaseStatus::Pending);
        assert_eq!(projection.paid_installments, 0);
    }

    /// S2: scheduling payments and activating moves Pending -> Active.
    #[tokio::test]
    async fn s2_scheduling_then_activation() {
        let h = harness();
        let lease_id = open_lease(&h, Decimal::new(120000, 2), 12);

        let schedule = scheduler::generate(lease_id, Decimal::new(120000, 2), 12, None).unwrap();
        for installment in &schedule {
            h.storage.put_payment_schedule(installment).unwrap();
            persist_event(
                &h.ledger,
                lease_id,
                EventType::PaymentScheduled,
                serde_json::json!({"amount": installment.amount.to_string()}),
            )
            .unwrap();
        }

        h.coordinator.check_and_activate(lease_id).await.unwrap();
        assert_eq!(h.storage.get_lease(lease_id).unwrap().status, LeaseStatus::Active);
    }

    /// S3: every installment paid in full drives the lease to
    /// Completed, and a lease below that threshold stays Active.
    #[tokio::test]
    async fn s3_full_payment_completes_the_lease() {
        let h = harness();
        let lease_id = open_lease(&h, Decimal::new(100000, 2), 2);

        let mut schedule = scheduler::generate(lease_id, Decimal::new(100000, 2), 2, None).unwrap();
        for installment in &schedule {
            h.storage.put_payment_schedule(installment).unwrap();
        }
        h.coordinator.check_and_activate(lease_id).await.unwrap();

        schedule[0].status = PaymentStatus::Paid;
        h.storage.put_payment_schedule(&schedule[0]).unwrap();
        persist_event(
            &h.ledger,
            lease_id,
            EventType::PaymentSucceeded,
            serde_json::json!({"amount": schedule[0].amount.to_string()}),
        )
        .unwrap();

        h.coordinator.check_and_complete(lease_id).await.unwrap();
        assert_eq!(h.storage.get_lease(lease_id).unwrap().status, LeaseStatus::Active);

        schedule[1].status = PaymentStatus::Paid;
        h.storage.put_payment_schedule(&schedule[1]).unwrap();
        persist_event(
            &h.ledger,
            lease_id,
            EventType::PaymentSucceeded,
            serde_json::json!({"amount": schedule[1].amount.to_string()}),
        )
        .unwrap();

        h.coordinator.check_and_complete(lease_id).await.unwrap();
        assert_eq!(h.storage.get_lease(lease_id).unwrap().status, LeaseStatus::Completed);
    }

    /// S4: three distinct payments reaching Failed drives the lease to
    /// Defaulted, not Completed.
    #[tokio::test]
    async fn s4_exhausted_retries_default_the_lease() {
        let h = harness();
        let lease_id = open_lease(&h, Decimal::new(300000, 2), 3);
        let schedule = scheduler::generate(lease_id, Decimal::new(300000, 2), 3, None).unwrap();
        for installment in &schedule {
            h.storage.put_payment_schedule(installment).unwrap();
        }
        h.coordinator.check_and_activate(lease_id).await.unwrap();

        for installment in &schedule {
            let mut failed = installment.clone();
            failed.status = PaymentStatus::Failed;
            h.storage.put_payment_schedule(&failed).unwrap();
            persist_event(
                &h.ledger,
                lease_id,
                EventType::PaymentFailed,
                serde_json::json!({"reason": "card declined"}),
            )
            .unwrap();
        }

        h.coordinator.check_and_default(lease_id).await.unwrap();
        assert_eq!(h.storage.get_lease(lease_id).unwrap().status, LeaseStatus::Defaulted);
    }

    /// S5: replaying the same history twice yields an identical
    /// projection (deterministic replay).
    #[tokio::test]
    async fn s5_replay_is_deterministic() {
        let h = harness();
        let lease_id = open_lease(&h, Decimal::new(60000, 2), 3);
        persist_event(
            &h.ledger,
            lease_id,
            EventType::PaymentSucceeded,
            serde_json::json!({"amount": "200.00"}),
        )
        .unwrap();

        let history = h.ledger.get_lease_history(lease_id).unwrap();
        let first = reconstructor::fold(&history, None).unwrap();
        let second = reconstructor::fold(&history, None).unwrap();
        assert_eq!(first.status, second.status);
        assert_eq!(first.total_paid, second.total_paid);
        assert_eq!(first.event_count, second.event_count);
    }

    /// S6: `until` truncates the fold at a sequence cutoff, so a
    /// projection taken mid-history never sees later events.
    #[tokio::test]
    async fn s6_until_cutoff_excludes_later_events() {
        let h = harness();
        let lease_id = open_lease(&h, Decimal::new(60000, 2), 3);
        let cutoff = h.ledger.get_lease_history(lease_id).unwrap().last().unwrap().sequence_number;

        persist_event(
            &h.ledger,
            lease_id,
            EventType::PaymentSucceeded,
            serde_json::json!({"amount": "200.00"}),
        )
        .unwrap();

        let history = h.ledger.get_lease_history(lease_id).unwrap();
        let truncated = reconstructor::fold(&history, Some(cutoff)).unwrap();
        let full = reconstructor::fold(&history, None).unwrap();

        assert_eq!(truncated.total_paid, Decimal::ZERO);
        assert_eq!(full.total_paid, Decimal::new(20000, 2));
    }
}
