//! Dead-letter queue (spec §4.8): a handler's failure on one event never
//! blocks other handlers for that event, nor other events on the topic —
//! the failure is captured here for inspection and manual reprocessing.

use crate::types::EventEnvelope;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single dead-lettered event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// DLQ-assigned identifier.
    pub dlq_id: Uuid,
    /// The event as it was published.
    pub original_event: EventEnvelope,
    /// The handler error's display string.
    pub error: String,
    /// When the handler failed.
    pub failed_at: DateTime<Utc>,
}

/// In-memory dead-letter store. Oldest-first ordering, matching
/// `list(limit)`'s implied "inspect what's been piling up" use case.
#[derive(Default)]
pub struct Dlq {
    entries: Mutex<Vec<DlqEntry>>,
}

impl Dlq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed delivery. Returns the assigned `dlqId`.
    pub fn push(&self, original_event: EventEnvelope, error: String) -> Uuid {
        let entry = DlqEntry {
            dlq_id: Uuid::now_v7(),
            original_event,
            error,
            failed_at: Utc::now(),
        };
        let dlq_id = entry.dlq_id;
        self.entries.lock().push(entry);
        dlq_id
    }

    /// The oldest `limit` entries still in the queue.
    pub fn list(&self, limit: usize) -> Vec<DlqEntry> {
        self.entries.lock().iter().take(limit).cloned().collect()
    }

    /// Remove an entry. Returns `false` if it was already acknowledged
    /// or never existed.
    pub fn acknowledge(&self, dlq_id: Uuid) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.dlq_id != dlq_id);
        entries.len() != before
    }

    /// Number of entries currently queued.
    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
