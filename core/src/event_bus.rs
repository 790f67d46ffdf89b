use crate::model::{BusEvent, FreezeLifecycleEvent, TraceEvent};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Fans trace events and freeze lifecycle events out to every live
/// subscriber (typically one per open `StreamTraces` call). Each subscriber
/// gets its own bounded queue; a slow or stalled subscriber has events
/// dropped for it rather than blocking publication for everyone else.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<Uuid, mpsc::Sender<BusEvent>>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Registers a new subscriber and returns its id plus the receiving end
    /// of its queue. The id must be passed back to [`EventBus::unsubscribe`]
    /// when the stream closes.
    pub async fn subscribe(&self) -> (Uuid, mpsc::Receiver<BusEvent>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = Uuid::new_v4();
        self.subscribers.write().await.insert(id, tx);
        (id, rx)
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        self.subscribers.write().await.remove(&id);
    }

    /// Publishes to every current subscriber. Never blocks: a full queue
    /// silently drops the event for that subscriber only — expected
    /// steady-state behavior under load, not an error.
    pub async fn publish(&self, event: BusEvent) {
        let subscribers = self.subscribers.read().await;
        for sender in subscribers.values() {
            if sender.try_send(event.clone()).is_err() {
                debug!("event bus subscriber queue full, dropping event");
            }
        }
    }

    pub async fn publish_trace(&self, event: TraceEvent) {
        self.publish(BusEvent::Trace(event)).await;
    }

    pub async fn publish_freeze_lifecycle(&self, trace_id: &str, state: &str) {
        self.publish(BusEvent::FreezeLifecycle(FreezeLifecycleEvent {
            trace_id: trace_id.to_string(),
            state: state.to_string(),
            unix_seconds: Utc::now().timestamp(),
        }))
        .await;
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(trace_id: &str) -> TraceEvent {
        TraceEvent {
            trace_id: trace_id.to_string(),
            service: "orders".to_string(),
            endpoint: "/order".to_string(),
            unix_seconds: 0,
            attributes: None,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_trace_events() {
        let bus = EventBus::new(8);
        let (_id, mut rx) = bus.subscribe().await;

        bus.publish_trace(sample_event("t1")).await;

        let received = rx.recv().await.expect("event delivered");
        match received {
            BusEvent::Trace(event) => assert_eq!(event.trace_id, "t1"),
            BusEvent::FreezeLifecycle(_) => panic!("expected a trace event"),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_freeze_lifecycle_events() {
        let bus = EventBus::new(8);
        let (_id, mut rx) = bus.subscribe().await;

        bus.publish_freeze_lifecycle("t1", "frozen").await;

        let received = rx.recv().await.expect("event delivered");
        match received {
            BusEvent::FreezeLifecycle(event) => {
                assert_eq!(event.trace_id, "t1");
                assert_eq!(event.state, "frozen");
            }
            BusEvent::Trace(_) => panic!("expected a freeze lifecycle event"),
        }
    }

    #[tokio::test]
    async fn unsubscribed_receiver_gets_nothing_new() {
        let bus = EventBus::new(8);
        let (id, mut rx) = bus.subscribe().await;
        bus.unsubscribe(id).await;

        bus.publish_trace(sample_event("t1")).await;

        assert_eq!(bus.subscriber_count().await, 0);
        // The channel is dropped on the sender side; recv resolves to None
        // rather than blocking.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let bus = EventBus::new(1);
        let (_id, mut rx) = bus.subscribe().await;

        bus.publish_trace(sample_event("first")).await;
        bus.publish_trace(sample_event("second")).await;

        let received = rx.recv().await.expect("at least the first event survives");
        match received {
            BusEvent::Trace(event) => assert_eq!(event.trace_id, "first"),
            BusEvent::FreezeLifecycle(_) => panic!("expected a trace event"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_their_own_copy() {
        let bus = EventBus::new(8);
        let (_id_a, mut rx_a) = bus.subscribe().await;
        let (_id_b, mut rx_b) = bus.subscribe().await;

        bus.publish_trace(sample_event("t1")).await;

        let a = rx_a.recv().await.unwrap();
        let b = rx_b.recv().await.unwrap();
        assert!(matches!(a, BusEvent::Trace(e) if e.trace_id == "t1"));
        assert!(matches!(b, BusEvent::Trace(e) if e.trace_id == "t1"));
    }
}
