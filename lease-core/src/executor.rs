//! Payment executor (spec §4.6): attempts a scheduled payment against
//! the gateway, persists the outcome, and drives the retry engine.

use crate::{
    coordinator::LifecycleEvaluator,
    ledger::Ledger,
    lock::LeaseLockRegistry,
    persister::persist_event,
    retry::RetryEngine,
    storage::Storage,
    types::{EventType, LeaseStatus, PaymentStatus},
    Error, Result,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use uuid::Uuid;

/// Fraction of the remaining balance waived on early payoff (spec §4.6).
const EARLY_PAYOFF_DISCOUNT_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 2); // 0.02

/// Outcome of a single gateway charge attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    Success,
    Failure { reason: String },
}

/// External collaborator named in spec §6. Implementations live outside
/// `lease-core` (the `payment-gateway` crate ships an in-memory stub).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(
        &self,
        payment_id: Uuid,
        lease_id: Uuid,
        amount: Decimal,
        attempt_number: u32,
    ) -> Result<GatewayOutcome>;
}

/// Executes scheduled payments against a `PaymentGateway`.
pub struct PaymentExecutor {
    storage: Arc<Storage>,
    ledger: Arc<Ledger>,
    retry: RetryEngine,
    locks: Arc<LeaseLockRegistry>,
    gateway: Arc<dyn PaymentGateway>,
    lifecycle: Arc<dyn LifecycleEvaluator>,
}

impl PaymentExecutor {
    pub fn new(
        storage: Arc<Storage>,
        ledger: Arc<Ledger>,
        retry: RetryEngine,
        locks: Arc<LeaseLockRegistry>,
        gateway: Arc<dyn PaymentGateway>,
        lifecycle: Arc<dyn LifecycleEvaluator>,
    ) -> Self {
        Self {
            storage,
            ledger,
            retry,
            locks,
            gateway,
            lifecycle,
        }
    }

    /// Generate and persist a lease's payment schedule.
    pub async fn schedule_payments_for_lease(
        &self,
        lease_id: Uuid,
        principal: Decimal,
        term_months: u32,
        start_date: Option<chrono::DateTime<Utc>>,
    ) -> Result<Vec<crate::types::PaymentSchedule>> {
        let _guard = self.locks.acquire(lease_id).await;

        let schedule = crate::scheduler::generate(lease_id, principal, term_months, start_date)?;
        for installment in &schedule {
            self.storage.put_payment_schedule(installment)?;
            persist_event(
                &self.ledger,
                lease_id,
                EventType::PaymentScheduled,
                serde_json::json!({
                    "paymentId": installment.id,
                    "installmentNumber": installment.installment_number,
                    "amount": installment.amount.to_string(),
                    "dueDate": installment.due_date,
                }),
            )?;
        }

        tracing::info!(lease_id = %lease_id, count = schedule.len(), "payment schedule generated");
        Ok(schedule)
    }

    /// Attempt a single scheduled payment. Persists `PAYMENT_ATTEMPTED`
    /// before calling the gateway and `PAYMENT_SUCCEEDED`/`PAYMENT_FAILED`
    /// after. On failure, either enqueues the next retry or, once
    /// exhausted, asks the lifecycle evaluator to default the lease.
    pub async fn attempt(&self, payment_id: Uuid) -> Result<GatewayOutcome> {
        let mut payment = self.storage.get_payment_schedule(payment_id)?;
        if matches!(payment.status, PaymentStatus::Paid | PaymentStatus::Cancelled) {
            return Err(Error::InvalidTransition(format!(
                "payment {} is not retryable from status {:?}",
                payment_id, payment.status
            )));
        }

        let _guard = self.locks.acquire(payment.lease_id).await;

        persist_event(
            &self.ledger,
            payment.lease_id,
            EventType::PaymentAttempted,
            serde_json::json!({
                "paymentId": payment_id,
                "attempt": payment.retry_count + 1,
                "amount": payment.amount.to_string(),
            }),
        )?;

        let outcome = self
            .gateway
            .charge(payment_id, payment.lease_id, payment.amount, payment.retry_count + 1)
            .await?;
        payment.last_attempt_at = Some(Utc::now());
        payment.updated_at = Utc::now();

        match &outcome {
            GatewayOutcome::Success => {
                payment.status = PaymentStatus::Paid;
                self.storage.put_payment_schedule(&payment)?;

                persist_event(
                    &self.ledger,
                    payment.lease_id,
                    EventType::PaymentSucceeded,
                    serde_json::json!({
                        "paymentId": payment_id,
                        "amount": payment.amount.to_string(),
                    }),
                )?;

                tracing::info!(payment_id = %payment_id, "payment succeeded");
            }
            GatewayOutcome::Failure { reason } => {
                payment.retry_count += 1;
                payment.status = PaymentStatus::Failed;
                self.storage.put_payment_schedule(&payment)?;

                persist_event(
                    &self.ledger,
                    payment.lease_id,
                    EventType::PaymentFailed,
                    serde_json::json!({
                        "paymentId": payment_id,
                        "reason": reason,
                        "attempt": payment.retry_count,
                    }),
                )?;

                tracing::warn!(payment_id = %payment_id, attempt = payment.retry_count, reason, "payment failed");

                if self.retry.is_exhausted(payment.retry_count) {
                    self.lifecycle.check_lease_for_default(payment.lease_id).await?;
                } else {
                    let fire_at = self.retry.next_time(Utc::now(), payment.retry_count);
                    self.retry.enqueue(payment_id, fire_at)?;
                }
            }
        }

        Ok(outcome)
    }

    /// Quote and collect an early payoff: a 2% discount on the remaining
    /// balance, charged once, then every unpaid installment is cancelled
    /// and the lease is driven to `COMPLETED`. Returns the amount charged
    /// (spec §4.6, grounded on
    /// `original_source/services/payment_service/domain/payment_service.py`'s
    /// `calculate_early_payoff`/`process_early_payoff`: remaining balance
    /// is scheduled minus paid, not merely the sum of pending rows, since
    /// some installments may already be cancelled from a prior partial
    /// payoff).
    pub async fn process_early_payoff(&self, lease_id: Uuid) -> Result<Decimal> {
        let _guard = self.locks.acquire(lease_id).await;

        let mut lease = self.storage.get_lease(lease_id)?;
        if !matches!(lease.status, LeaseStatus::Pending | LeaseStatus::Active) {
            return Err(Error::InvalidTransition(format!(
                "early payoff is only permitted from PENDING or ACTIVE, lease {} is {:?}",
                lease_id, lease.status
            )));
        }

        let schedule = self.storage.get_schedule_for_lease(lease_id)?;
        let scheduled_total: Decimal = schedule
            .iter()
            .filter(|p| p.status != PaymentStatus::Cancelled)
            .map(|p| p.amount)
            .sum();
        let paid_total: Decimal = schedule
            .iter()
            .filter(|p| p.status == PaymentStatus::Paid)
            .map(|p| p.amount)
            .sum();
        let remaining = scheduled_total - paid_total;
        let discount = (remaining * EARLY_PAYOFF_DISCOUNT_RATE)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
        let payoff = remaining - discount;

        let outcome = self
            .gateway
            .charge(Uuid::now_v7(), lease_id, payoff, 1)
            .await?;
        if let GatewayOutcome::Failure { reason } = outcome {
            return Err(Error::Gateway(reason));
        }

        for mut installment in schedule {
            if matches!(installment.status, PaymentStatus::Pending | PaymentStatus::Failed) {
                installment.status = PaymentStatus::Cancelled;
                installment.updated_at = Utc::now();
                self.storage.put_payment_schedule(&installment)?;
            }
        }

        // Early payoff drives PENDING or ACTIVE straight to COMPLETED; it
        // carries its own eligibility check above rather than going
        // through the ordinary ACTIVE-only completion guard.
        lease.status = LeaseStatus::Completed;
        lease.updated_at = Utc::now();
        self.storage.put_lease(&lease)?;

        persist_event(
            &self.ledger,
            lease_id,
            EventType::PaymentSucceeded,
            serde_json::json!({
                "leaseId": lease_id,
                "remaining": remaining.to_string(),
                "discount": discount.to_string(),
                "totalPaid": payoff.to_string(),
                "earlyPayoff": true,
            }),
        )?;

        persist_event(
            &self.ledger,
            lease_id,
            EventType::LeaseCompleted,
            serde_json::json!({"leaseId": lease_id, "earlyPayoff": true}),
        )?;

        tracing::info!(lease_id = %lease_id, remaining = %remaining, discount = %discount, payoff = %payoff, "early payoff processed");
        Ok(payoff)
    }
}
