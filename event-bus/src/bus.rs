//! In-process publish/subscribe bus with a handler registry and dead-letter
//! routing (spec §4.8). Not a durability boundary: callers persist to the
//! ledger before publishing, and the bus's broadcast delivery is
//! best-effort — a subscriber that needs replay reads the ledger, not
//! the bus (spec §5).

use crate::{
    dlq::Dlq,
    metrics,
    types::EventEnvelope,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default broadcast channel capacity per topic. A slow consumer that
/// falls this far behind drops messages (`RecvError::Lagged`) rather
/// than applying backpressure to publishers — matching "must not block
/// siblings" (spec §5).
const CHANNEL_CAPACITY: usize = 1024;

/// A handler registered for one event type on one topic.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, event: &EventEnvelope) -> crate::Result<()>;
}

struct Topic {
    sender: broadcast::Sender<EventEnvelope>,
    handlers: DashMap<String, Vec<Arc<dyn Handler>>>,
}

impl Topic {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            handlers: DashMap::new(),
        }
    }
}

/// The bus. Cheap to clone: internally `Arc`-backed.
pub struct EventBus {
    topics: DashMap<String, Arc<Topic>>,
    dlq: Arc<Dlq>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
            dlq: Arc::new(Dlq::new()),
        }
    }

    /// The bus's dead-letter queue.
    pub fn dlq(&self) -> &Dlq {
        &self.dlq
    }

    fn topic(&self, topic: &str) -> Arc<Topic> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(Topic::new()))
            .clone()
    }

    /// Broadcast `event` on `topic`. Returns `true` iff at least one
    /// subscriber was registered to receive it at publish time.
    pub fn publish(&self, topic: &str, event: EventEnvelope) -> bool {
        let t = self.topic(topic);
        let delivered = t.sender.receiver_count() > 0;

        metrics::EVENTS_PUBLISHED_TOTAL
            .with_label_values(&[topic, if delivered { "true" } else { "false" }])
            .inc();

        // Err means no receivers were subscribed; `delivered` already
        // captured that, so the send failure itself is not an error.
        let _ = t.sender.send(event);

        tracing::debug!(topic, delivered, "event published");
        delivered
    }

    /// Register `handler` for `event_type` on `topic`. Handlers fire in
    /// registration order; multiple handlers per event type are allowed.
    pub fn register_handler(
        &self,
        topic: &str,
        event_type: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) {
        let t = self.topic(topic);
        t.handlers.entry(event_type.into()).or_default().push(handler);
    }

    /// Begin consuming `topics`: spawns a dispatch task per topic that
    /// reads from its broadcast channel and fans out to registered
    /// handlers. Returns immediately; consumption runs in the background
    /// for the life of the bus.
    pub fn consume(self: &Arc<Self>, topics: impl IntoIterator<Item = impl Into<String>>) {
        for topic in topics {
            let topic = topic.into();
            let bus = self.clone();
            let mut receiver = bus.topic(&topic).sender.subscribe();

            tokio::spawn(async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => bus.dispatch(&topic, event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(topic = %topic, skipped, "consumer lagged, dropped events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }
    }

    async fn dispatch(&self, topic: &str, event: EventEnvelope) {
        let t = self.topic(topic);
        let handlers = t.handlers.get(&event.event_type);

        let handlers = match handlers {
            Some(h) if !h.is_empty() => h,
            _ => {
                tracing::warn!(event_type = %event.event_type, topic, "no handler for event type, dropping");
                return;
            }
        };

        for handler in handlers.iter() {
            match handler.handle(&event).await {
                Ok(()) => {
                    metrics::HANDLER_INVOCATIONS_TOTAL
                        .with_label_values(&[&event.event_type, "success"])
                        .inc();
                }
                Err(err) => {
                    metrics::HANDLER_INVOCATIONS_TOTAL
                        .with_label_values(&[&event.event_type, "failure"])
                        .inc();
                    metrics::DLQ_ROUTED_TOTAL
                        .with_label_values(&[&event.event_type])
                        .inc();
                    tracing::error!(event_type = %event.event_type, error = %err, "handler failed, routing to DLQ");
                    self.dlq.push(event.clone(), err.to_string());
                }
            }
        }
    }
}
