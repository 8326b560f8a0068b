//! Retry engine (spec §4.7): exponential backoff with a cap and jitter,
//! plus a durable deferred-dispatch queue so scheduled retries survive a
//! restart (spec §9's note that in-process timers alone are not enough).

use crate::{config::RetryConfig, error::Result, storage::Storage};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

/// Retry engine over a `Storage` handle's `scheduled_retries` column
/// family.
pub struct RetryEngine {
    storage: Arc<Storage>,
    config: RetryConfig,
}

impl RetryEngine {
    pub fn new(storage: Arc<Storage>, config: RetryConfig) -> Self {
        Self { storage, config }
    }

    /// Delay before `attempt` (1-indexed), in seconds, before jitter.
    fn base_delay_secs(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1);
        self.config
            .base_delay_secs
            .saturating_mul(self.config.multiplier.saturating_pow(exponent))
            .min(self.config.max_delay_secs)
    }

    /// Delay before `attempt`, in seconds, with jitter added on top (never
    /// subtracted, so the delay never drops below the deterministic
    /// floor).
    pub fn next_delay(&self, attempt: u32) -> u64 {
        let base = self.base_delay_secs(attempt);
        if self.config.jitter_fraction <= 0.0 {
            return base;
        }
        let max_jitter = (base as f64 * self.config.jitter_fraction) as u64;
        if max_jitter == 0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0..=max_jitter);
        base + jitter
    }

    /// Absolute fire time for `attempt`, computed from `now`.
    pub fn next_time(&self, now: DateTime<Utc>, attempt: u32) -> DateTime<Utc> {
        now + chrono::Duration::seconds(self.next_delay(attempt) as i64)
    }

    /// Whether `attempt` has exhausted the retry budget (spec §4.7: 3
    /// attempts).
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.config.max_attempts
    }

    /// Durably enqueue a retry for `payment_id`, to fire at `fire_at`.
    pub fn enqueue(&self, payment_id: Uuid, fire_at: DateTime<Utc>) -> Result<()> {
        let nanos = fire_at
            .timestamp_nanos_opt()
            .unwrap_or(i64::from(fire_at.timestamp() as i32) * 1_000_000_000);
        self.storage.put_scheduled_retry(nanos, payment_id)
    }

    /// Remove a payment's retry entry (e.g. once it has been dispatched).
    pub fn dequeue(&self, payment_id: Uuid, fire_at: DateTime<Utc>) -> Result<()> {
        let nanos = fire_at
            .timestamp_nanos_opt()
            .unwrap_or(i64::from(fire_at.timestamp() as i32) * 1_000_000_000);
        self.storage.remove_scheduled_retry(nanos, payment_id)
    }

    /// Payment IDs whose retry is due at or before `now`.
    pub fn due(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or(i64::from(now.timestamp() as i32) * 1_000_000_000);
        Ok(self
            .storage
            .due_scheduled_retries(nanos)?
            .into_iter()
            .map(|(_, payment_id)| payment_id)
            .collect())
    }
}
