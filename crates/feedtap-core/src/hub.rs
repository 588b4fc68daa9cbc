//! Named-topic publish/subscribe hub.
//!
//! Every subscription owns an unbounded queue drained by its own task, so
//! `publish` only enqueues and returns. A slow or panicking handler delays or
//! loses only its own events; it never blocks publishers or other
//! subscribers, and no registry lock is held while a handler runs.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::HubError;

/// Opaque event payload. The concrete type is agreed per topic.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Identifier returned by [`Hub::subscribe`].
pub type SubscriptionId = u64;

/// A published event.
#[derive(Clone)]
pub struct Event {
    topic: Arc<str>,
    payload: Payload,
}

impl Event {
    /// Wrap a value as an event on `topic`.
    pub fn new<T: Any + Send + Sync>(topic: &str, payload: T) -> Self {
        Self {
            topic: Arc::from(topic),
            payload: Arc::new(payload),
        }
    }

    /// Topic the event was published on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Raw payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Borrow the payload as `T` if that is its concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("topic", &self.topic).finish_non_exhaustive()
    }
}

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::UnboundedSender<Event>,
    /// Cleared on unsubscribe; the drain task checks it before every event.
    active: Arc<AtomicBool>,
}

/// Topic registry with fire-and-forget fan-out.
pub struct Hub {
    topics: DashMap<String, Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl Hub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Check that `topic` is a usable name.
    pub fn validate_topic(topic: &str) -> Result<(), HubError> {
        let valid = !topic.is_empty()
            && topic
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '.' | '_' | '-'));
        if valid {
            Ok(())
        } else {
            Err(HubError::InvalidTopic(topic.to_string()))
        }
    }

    /// Register `handler` for future events on `topic`.
    ///
    /// Must be called from within a Tokio runtime; the handler runs on a task
    /// spawned there.
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Result<SubscriptionId, HubError>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        Self::validate_topic(topic)?;
        let runtime = Handle::try_current().map_err(|_| HubError::NoRuntime)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let active = Arc::new(AtomicBool::new(true));
        let name = topic.to_string();

        let running = active.clone();
        runtime.spawn(async move {
            while let Some(event) = rx.recv().await {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                    warn!(topic = %name, subscription = id, "event handler panicked");
                }
            }
            trace!(topic = %name, subscription = id, "subscriber drained");
        });

        self.topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, tx, active });

        debug!(topic, subscription = id, "subscribed");
        Ok(id)
    }

    /// Register a handler that only sees payloads of type `T`.
    ///
    /// Events on `topic` carrying another type are skipped.
    pub fn subscribe_typed<T, F>(&self, topic: &str, handler: F) -> Result<SubscriptionId, HubError>
    where
        T: Any + Send + Sync,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(topic, move |event| {
            if let Some(payload) = event.downcast_ref::<T>() {
                handler(payload);
            }
        })
    }

    /// Remove a subscription. Events already queued for it are dropped; a
    /// handler call in progress runs to completion.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<(), HubError> {
        for mut entry in self.topics.iter_mut() {
            let subscribers = entry.value_mut();
            if let Some(pos) = subscribers.iter().position(|s| s.id == id) {
                let removed = subscribers.remove(pos);
                removed.active.store(false, Ordering::Release);
                return Ok(());
            }
        }
        Err(HubError::NotFound(id))
    }

    /// Publish `payload` on `topic`. Returns how many subscribers it was queued for.
    pub fn publish<T: Any + Send + Sync>(&self, topic: &str, payload: T) -> usize {
        self.publish_event(Event::new(topic, payload))
    }

    /// Publish an already-built event.
    pub fn publish_event(&self, event: Event) -> usize {
        // Snapshot the senders so the shard lock is released before sending.
        let senders: Vec<mpsc::UnboundedSender<Event>> = match self.topics.get(event.topic()) {
            Some(subscribers) => subscribers.iter().map(|s| s.tx.clone()).collect(),
            None => return 0,
        };

        senders
            .into_iter()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    /// Whether `topic` has at least one subscriber.
    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.subscriber_count(topic) > 0
    }

    /// Number of subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
