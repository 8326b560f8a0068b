//! Prometheus metrics for the lease/payment core.
//!
//! Counters only — the roll-up/reporting service that would scrape and
//! export these is out of scope (see SPEC_FULL.md).

use prometheus::{register_histogram, register_int_counter, Histogram, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector.
#[derive(Clone)]
pub struct Metrics {
    /// Leases created.
    pub leases_created_total: IntCounter,

    /// Leases activated.
    pub leases_activated_total: IntCounter,

    /// Leases completed.
    pub leases_completed_total: IntCounter,

    /// Leases defaulted.
    pub leases_defaulted_total: IntCounter,

    /// Payment attempts made.
    pub payments_attempted_total: IntCounter,

    /// Payment attempts that succeeded.
    pub payments_succeeded_total: IntCounter,

    /// Payment attempts that failed.
    pub payments_failed_total: IntCounter,

    /// Retries enqueued.
    pub retries_scheduled_total: IntCounter,

    /// Ledger append latency.
    pub ledger_append_duration: Histogram,

    pub registry: Arc<Registry>,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        macro_rules! counter {
            ($name:literal, $help:literal) => {{
                let c = register_int_counter!($name, $help)?;
                registry.register(Box::new(c.clone()))?;
                c
            }};
        }

        let leases_created_total = counter!("lease_core_leases_created_total", "Total leases created");
        let leases_activated_total =
            counter!("lease_core_leases_activated_total", "Total leases activated");
        let leases_completed_total =
            counter!("lease_core_leases_completed_total", "Total leases completed");
        let leases_defaulted_total =
            counter!("lease_core_leases_defaulted_total", "Total leases defaulted");
        let payments_attempted_total = counter!(
            "lease_core_payments_attempted_total",
            "Total payment attempts made"
        );
        let payments_succeeded_total = counter!(
            "lease_core_payments_succeeded_total",
            "Total payment attempts that succeeded"
        );
        let payments_failed_total = counter!(
            "lease_core_payments_failed_total",
            "Total payment attempts that failed"
        );
        let retries_scheduled_total = counter!(
            "lease_core_retries_scheduled_total",
            "Total retries enqueued"
        );

        let ledger_append_duration = register_histogram!(
            "lease_core_ledger_append_duration_seconds",
            "Histogram of ledger append latencies",
            vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]
        )?;
        registry.register(Box::new(ledger_append_duration.clone()))?;

        Ok(Self {
            leases_created_total,
            leases_activated_total,
            leases_completed_total,
            leases_defaulted_total,
            payments_attempted_total,
            payments_succeeded_total,
            payments_failed_total,
            retries_scheduled_total,
            ledger_append_duration,
            registry,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to create metrics")
    }
}
