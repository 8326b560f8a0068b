//! Idempotency store (spec §4.1).
//!
//! Resolves the Open Question in spec §9 about the ambiguous `(true,
//! null)` result: instead of a `(bool, Option<T>)` pair, `check_and_store`
//! returns a three-way `IdempotencyOutcome` so callers can't conflate "key
//! is fresh, go ahead" with "key is in flight, someone else is already
//! working on it" — both of which return a bare `true`/`null` pair in the
//! two-way encoding.

use crate::{error::Result, storage::Storage, types::IdempotencyKey};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Result of a `check_and_store` call.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyOutcome {
    /// No record existed (or it had expired): the caller should proceed
    /// and eventually call `store_response`.
    Fresh,
    /// A record exists but has no cached response yet: another caller is
    /// (or was) mid-flight on the same key.
    InFlight,
    /// A record exists with a cached response: replay it, don't re-run
    /// the operation.
    Completed(serde_json::Value),
}

/// TTL for idempotency keys once recorded. Spec §4.1 calls for expiry;
/// 24h matches the window a client is expected to retry within.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Idempotency store backed by the `idempotency_keys` column family.
pub struct IdempotencyStore {
    storage: Arc<Storage>,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    pub fn with_ttl(storage: Arc<Storage>, ttl: Duration) -> Self {
        Self { storage, ttl }
    }

    /// Check a key and, if fresh, record it as in-flight in the same
    /// call. First-writer-wins: a second caller racing on the same key
    /// sees `InFlight` or `Completed`, never re-registers the key.
    pub fn check_and_store(&self, key: &str, operation: &str) -> Result<IdempotencyOutcome> {
        let now = Utc::now();

        if let Some(existing) = self.storage.get_idempotency_key(key)? {
            if existing.expires_at <= now {
                self.storage.delete_idempotency_key(key)?;
            } else {
                return Ok(match existing.response_payload {
                    Some(payload) => IdempotencyOutcome::Completed(payload),
                    None => IdempotencyOutcome::InFlight,
                });
            }
        }

        let record = IdempotencyKey {
            key: key.to_string(),
            operation: operation.to_string(),
            response_payload: None,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.storage.put_idempotency_key(&record)?;
        Ok(IdempotencyOutcome::Fresh)
    }

    /// Attach the completed response to a previously-registered key.
    pub fn store_response(&self, key: &str, response: serde_json::Value) -> Result<()> {
        let mut record = match self.storage.get_idempotency_key(key)? {
            Some(record) => record,
            None => IdempotencyKey {
                key: key.to_string(),
                operation: "unknown".to_string(),
                response_payload: None,
                created_at: Utc::now(),
                expires_at: Utc::now() + self.ttl,
            },
        };
        record.response_payload = Some(response);
        self.storage.put_idempotency_key(&record)
    }

    /// Sweep expired keys. Intended to run on a periodic background
    /// task; not wired to a timer here since scheduling that timer is an
    /// outer-surface concern (spec's "config *loading frameworks*" /
    /// HTTP-surface non-goals apply to the process that would drive it).
    pub fn sweep_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut removed = 0u64;
        for record in self.storage.scan_idempotency_keys()? {
            if record.expires_at <= now {
                self.storage.delete_idempotency_key(&record.key)?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "swept expired idempotency keys");
        }
        Ok(removed)
    }
}
