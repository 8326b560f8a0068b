//! Lifecycle coordinator (spec §4.9): the only place that fires derived
//! lease transitions, so `checkAndActivate`/`checkAndComplete`/
//! `checkAndDefault` can be called freely without double-firing a
//! transition that already happened.

use crate::{
    ledger::Ledger,
    lock::LeaseLockRegistry,
    persister::persist_event,
    reconstructor, state_machine,
    storage::Storage,
    types::{EventType, PaymentStatus},
    Result,
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Narrow capability the payment executor holds instead of a reference
/// to the full coordinator (spec §9's design note, grounded on
/// `original_source/services/payment_service/domain/payment_service.py`'s
/// `check_lease_for_default`).
#[async_trait]
pub trait LifecycleEvaluator: Send + Sync {
    async fn check_lease_for_default(&self, lease_id: Uuid) -> Result<()>;
}

/// Coordinates idempotent derived-transition checks across the lease
/// state machine.
pub struct LifecycleCoordinator {
    storage: Arc<Storage>,
    ledger: Arc<Ledger>,
    locks: Arc<LeaseLockRegistry>,
}

impl LifecycleCoordinator {
    pub fn new(storage: Arc<Storage>, ledger: Arc<Ledger>, locks: Arc<LeaseLockRegistry>) -> Self {
        Self {
            storage,
            ledger,
            locks,
        }
    }

    /// Activate a `Pending` lease once it has a payment schedule. No-op
    /// (not an error) if the lease is already `Active` or terminal.
    pub async fn check_and_activate(&self, lease_id: Uuid) -> Result<()> {
        let _guard = self.locks.acquire(lease_id).await;

        let history = self.ledger.get_lease_history(lease_id)?;
        let projection = reconstructor::fold(&history, None)?;

        if projection.status != crate::types::LeaseStatus::Pending {
            return Ok(());
        }
        if self.storage.get_schedule_for_lease(lease_id)?.is_empty() {
            return Ok(());
        }

        let new_status = state_machine::apply(projection.status, state_machine::Transition::Activate)?;
        let mut lease = self.storage.get_lease(lease_id)?;
        lease.status = new_status;
        lease.updated_at = chrono::Utc::now();
        self.storage.put_lease(&lease)?;

        // Activation is implicit and has no dedicated event type; every
        // other ledger event carries required fields of its own, so we
        // don't overload one to mark it.
        tracing::info!(lease_id = %lease_id, "lease activated");
        Ok(())
    }

    /// Complete an `Active` lease once every installment is paid or
    /// cancelled. No-op if the lease is not yet eligible.
    pub async fn check_and_complete(&self, lease_id: Uuid) -> Result<()> {
        let _guard = self.locks.acquire(lease_id).await;

        let history = self.ledger.get_lease_history(lease_id)?;
        let projection = reconstructor::fold(&history, None)?;
        if projection.status != crate::types::LeaseStatus::Active {
            return Ok(());
        }

        let schedule = self.storage.get_schedule_for_lease(lease_id)?;
        let outstanding = schedule
            .iter()
            .any(|p| matches!(p.status, PaymentStatus::Pending | PaymentStatus::Failed));
        if outstanding || schedule.is_empty() {
            return Ok(());
        }

        let new_status = state_machine::apply(projection.status, state_machine::Transition::Complete)?;
        let mut lease = self.storage.get_lease(lease_id)?;
        lease.status = new_status;
        lease.updated_at = chrono::Utc::now();
        self.storage.put_lease(&lease)?;

        persist_event(
            &self.ledger,
            lease_id,
            EventType::LeaseCompleted,
            serde_json::json!({"leaseId": lease_id}),
        )?;

        tracing::info!(lease_id = %lease_id, "lease completed");
        Ok(())
    }

    /// Default a `Pending` or `Active` lease once three of its payments
    /// have failed. Called by the payment executor after a payment has
    /// exhausted its retry budget.
    pub async fn check_and_default(&self, lease_id: Uuid) -> Result<()> {
        let _guard = self.locks.acquire(lease_id).await;

        let history = self.ledger.get_lease_history(lease_id)?;
        let projection = reconstructor::fold(&history, None)?;
        if !matches!(
            projection.status,
            crate::types::LeaseStatus::Pending | crate::types::LeaseStatus::Active
        ) {
            return Ok(());
        }

        let failed_payments = self
            .storage
            .get_schedule_for_lease(lease_id)?
            .iter()
            .filter(|p| p.status == PaymentStatus::Failed)
            .count();
        if failed_payments < 3 {
            return Ok(());
        }

        let new_status = state_machine::apply(projection.status, state_machine::Transition::Default)?;
        let mut lease = self.storage.get_lease(lease_id)?;
        lease.status = new_status;
        lease.updated_at = chrono::Utc::now();
        self.storage.put_lease(&lease)?;

        persist_event(
            &self.ledger,
            lease_id,
            EventType::LeaseDefaulted,
            serde_json::json!({"leaseId": lease_id}),
        )?;

        tracing::warn!(lease_id = %lease_id, "lease defaulted");
        Ok(())
    }
}

#[async_trait]
impl LifecycleEvaluator for LifecycleCoordinator {
    async fn check_lease_for_default(&self, lease_id: Uuid) -> Result<()> {
        self.check_and_default(lease_id).await
    }
}
