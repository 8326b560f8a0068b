//! Core types for the event bus (spec §4.8/§6): the envelope every
//! published event is wrapped in, plus the three standard topics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lease lifecycle events.
pub const LEASE_EVENTS: &str = "lease:events";
/// Payment lifecycle events.
pub const PAYMENT_EVENTS: &str = "payment:events";
/// Dead-letter topic for handler failures.
pub const EVENTS_DLQ: &str = "events:dlq";

/// Wire-format event envelope. `event_type` and `payload` are kept
/// separate in memory but flatten to a single JSON object on the wire,
/// matching spec.md §6's `{ eventId, eventType, timestamp, ...typed-fields }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Unique event identifier.
    pub event_id: Uuid,

    /// Event type code (e.g. `"PAYMENT_SUCCEEDED"`).
    pub event_type: String,

    /// Time the event was published.
    pub timestamp: DateTime<Utc>,

    /// Type-specific fields, flattened into the envelope on the wire.
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Build a new envelope, stamping `event_id`/`timestamp`.
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let envelope = EventEnvelope::new("PAYMENT_SUCCEEDED", serde_json::json!({"amount": "10.00"}));
        let encoded = serde_json::to_value(&envelope).unwrap();
        assert_eq!(encoded["eventType"], "PAYMENT_SUCCEEDED");
        assert_eq!(encoded["amount"], "10.00");

        let decoded: EventEnvelope = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.event_id, envelope.event_id);
    }
}
