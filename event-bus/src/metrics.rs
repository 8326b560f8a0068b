//! Prometheus metrics for the event bus.

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_int_counter_vec, CounterVec, IntCounterVec};

lazy_static! {
    /// Total events published, labeled by topic and whether a subscriber
    /// was present.
    pub static ref EVENTS_PUBLISHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "event_bus_published_total",
        "Total events published",
        &["topic", "delivered"]
    )
    .unwrap();

    /// Total handler invocations, labeled by event type and outcome.
    pub static ref HANDLER_INVOCATIONS_TOTAL: CounterVec = register_counter_vec!(
        "event_bus_handler_invocations_total",
        "Total handler invocations",
        &["event_type", "outcome"]
    )
    .unwrap();

    /// Total events routed to the dead-letter queue.
    pub static ref DLQ_ROUTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "event_bus_dlq_routed_total",
        "Total events routed to the DLQ",
        &["event_type"]
    )
    .unwrap();
}
