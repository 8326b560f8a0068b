//! In-memory stub implementation of `lease_core::executor::PaymentGateway`
//! (spec §6's gateway contract), grounded on
//! `original_source/services/payment_service/domain/payment_gateway.py`:
//! a tunable success rate that improves slightly with each retry, so
//! tests can exercise both the happy path and the exhausted-retry path
//! deterministically-ish.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

use async_trait::async_trait;
use lease_core::executor::{GatewayOutcome, PaymentGateway};
use lease_core::Result;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Default base success rate (70%), matching the original's `SUCCESS_RATE`.
const DEFAULT_SUCCESS_RATE: f64 = 0.70;

/// Per-retry bump to the success rate, matching the original's
/// `(attempt_number - 1) * 0.05`.
const RETRY_BUMP: f64 = 0.05;

const FAILURE_REASONS: [&str; 4] = [
    "Insufficient funds",
    "Card declined",
    "Network timeout",
    "Invalid card",
];

/// Stub payment gateway with a tunable success rate.
pub struct StubPaymentGateway {
    success_rate: RwLock<f64>,
}

impl Default for StubPaymentGateway {
    fn default() -> Self {
        Self {
            success_rate: RwLock::new(DEFAULT_SUCCESS_RATE),
        }
    }
}

impl StubPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base success rate. Must be in `[0.0, 1.0]`.
    pub fn set_success_rate(&self, rate: f64) {
        assert!((0.0..=1.0).contains(&rate), "success rate must be between 0.0 and 1.0");
        *self.success_rate.write() = rate;
        tracing::info!(rate, "payment gateway success rate updated");
    }

    fn adjusted_success_rate(&self, attempt_number: u32) -> f64 {
        let base = *self.success_rate.read();
        let bump = RETRY_BUMP * (attempt_number.saturating_sub(1)) as f64;
        (base + bump).min(1.0)
    }
}

#[async_trait]
impl PaymentGateway for StubPaymentGateway {
    async fn charge(
        &self,
        payment_id: Uuid,
        lease_id: Uuid,
        amount: Decimal,
        attempt_number: u32,
    ) -> Result<GatewayOutcome> {
        let adjusted = self.adjusted_success_rate(attempt_number);
        let roll: f64 = rand::random();

        if roll < adjusted {
            tracing::info!(%payment_id, %lease_id, %amount, "payment succeeded");
            Ok(GatewayOutcome::Success)
        } else {
            let reason = FAILURE_REASONS[rand::random::<usize>() % FAILURE_REASONS.len()];
            tracing::warn!(%payment_id, %lease_id, %amount, reason, "payment failed");
            Ok(GatewayOutcome::Failure {
                reason: reason.to_string(),
            })
        }
    }
}
