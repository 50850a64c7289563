//! Typed signal bus: in-process dispatcher keyed by `(kind, id)` topics.
//!
//! Unlike the [`InProcessEventBus`](crate::event_bus::InProcessEventBus),
//! which fans out immutable records to passive observers, signals drive
//! work: [`SignalBus::send`] awaits every handler connected to the topic
//! before returning, so the sender knows the work has been done.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use lumahub_domain::id::ConfigEntryId;
use lumahub_domain::unique_id::UniqueId;

/// Boxed future returned by signal handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type Handler = Arc<dyn Fn(Signal) -> HandlerFuture + Send + Sync>;

/// Routing key of a signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SignalTopic {
    /// A fresh instance list is available for a config entry.
    InstancesUpdated(ConfigEntryId),
    /// The entity with this unique id must detach from the host.
    EntityRemoved(UniqueId),
}

/// A signal with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    InstancesUpdated {
        entry_id: ConfigEntryId,
        payload: serde_json::Value,
    },
    EntityRemoved {
        unique_id: UniqueId,
    },
}

impl Signal {
    /// The topic this signal is delivered on.
    #[must_use]
    pub fn topic(&self) -> SignalTopic {
        match self {
            Self::InstancesUpdated { entry_id, .. } => SignalTopic::InstancesUpdated(*entry_id),
            Self::EntityRemoved { unique_id } => SignalTopic::EntityRemoved(unique_id.clone()),
        }
    }
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<SignalTopic, Vec<(u64, Handler)>>>,
}

impl Inner {
    fn handlers(&self) -> MutexGuard<'_, HashMap<SignalTopic, Vec<(u64, Handler)>>> {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn disconnect(&self, topic: &SignalTopic, id: u64) -> bool {
        let mut handlers = self.handlers();
        let Some(list) = handlers.get_mut(topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|(hid, _)| *hid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(topic);
        }
        removed
    }
}

/// Cheaply cloneable handle to a shared dispatcher.
#[derive(Clone, Default)]
pub struct SignalBus {
    inner: Arc<Inner>,
}

impl SignalBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `handler` to `topic`.
    ///
    /// The handler stays connected until the returned [`Subscription`] is
    /// explicitly disconnected.
    pub fn connect<F, Fut>(&self, topic: SignalTopic, handler: F) -> Subscription
    where
        F: Fn(Signal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let handler: Handler =
            Arc::new(move |signal| -> HandlerFuture { Box::pin(handler(signal)) });
        self.inner
            .handlers()
            .entry(topic.clone())
            .or_default()
            .push((id, handler));
        tracing::trace!(?topic, id, "signal handler connected");
        Subscription {
            bus: Arc::downgrade(&self.inner),
            topic,
            id,
        }
    }

    /// Deliver `signal` to every handler connected to its topic, one after
    /// the other, and return how many were invoked.
    ///
    /// Handlers are snapshotted before delivery, so handlers may connect or
    /// disconnect (themselves included) while a signal is in flight.
    pub async fn send(&self, signal: Signal) -> usize {
        let topic = signal.topic();
        let handlers: Vec<Handler> = self
            .inner
            .handlers()
            .get(&topic)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        tracing::debug!(?topic, handlers = handlers.len(), "dispatching signal");
        for handler in &handlers {
            handler(signal.clone()).await;
        }
        handlers.len()
    }

    /// Number of handlers currently connected to `topic`.
    #[must_use]
    pub fn handler_count(&self, topic: &SignalTopic) -> usize {
        self.inner.handlers().get(topic).map_or(0, Vec::len)
    }
}

/// Handle returned by [`SignalBus::connect`].
#[must_use = "a subscription is only removed by calling `disconnect`"]
pub struct Subscription {
    bus: Weak<Inner>,
    topic: SignalTopic,
    id: u64,
}

impl Subscription {
    /// Topic this subscription listens on.
    #[must_use]
    pub fn topic(&self) -> &SignalTopic {
        &self.topic
    }

    /// Stop receiving signals. Returns whether the handler was still connected.
    pub fn disconnect(self) -> bool {
        self.bus
            .upgrade()
            .is_some_and(|inner| inner.disconnect(&self.topic, self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn uid(value: &str) -> UniqueId {
        UniqueId::new(value).unwrap()
    }

    fn counter_handler(
        counter: &Arc<AtomicUsize>,
    ) -> impl Fn(Signal) -> std::future::Ready<()> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test]
    async fn should_deliver_only_to_matching_topic() {
        let bus = SignalBus::new();
        let hits_a = Arc::new(AtomicUsize::new(0));
        let hits_b = Arc::new(AtomicUsize::new(0));
        let _a = bus.connect(
            SignalTopic::EntityRemoved(uid("a")),
            counter_handler(&hits_a),
        );
        let _b = bus.connect(
            SignalTopic::EntityRemoved(uid("b")),
            counter_handler(&hits_b),
        );

        let delivered = bus
            .send(Signal::EntityRemoved { unique_id: uid("a") })
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(hits_a.load(Ordering::SeqCst), 1);
        assert_eq!(hits_b.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn should_not_confuse_topic_kinds() {
        let bus = SignalBus::new();
        let entry_id = ConfigEntryId::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _sub = bus.connect(
            SignalTopic::EntityRemoved(uid(&entry_id.to_string())),
            counter_handler(&hits),
        );

        let delivered = bus
            .send(Signal::InstancesUpdated {
                entry_id,
                payload: serde_json::json!({}),
            })
            .await;

        assert_eq!(delivered, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn should_stop_delivering_after_disconnect() {
        let bus = SignalBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let topic = SignalTopic::EntityRemoved(uid("a"));
        let sub = bus.connect(topic.clone(), counter_handler(&hits));
        assert_eq!(bus.handler_count(&topic), 1);

        assert!(sub.disconnect());
        assert_eq!(bus.handler_count(&topic), 0);

        bus.send(Signal::EntityRemoved { unique_id: uid("a") }).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn should_await_handlers_before_returning() {
        let bus = SignalBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let _sub = bus.connect(SignalTopic::EntityRemoved(uid("a")), move |_| {
            let seen = Arc::clone(&seen);
            async move {
                tokio::task::yield_now().await;
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        bus.send(Signal::EntityRemoved { unique_id: uid("a") }).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_allow_handler_to_disconnect_itself() {
        let bus = SignalBus::new();
        let topic = SignalTopic::EntityRemoved(uid("a"));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner_slot = Arc::clone(&slot);
        let sub = bus.connect(topic.clone(), move |_| {
            let taken = inner_slot.lock().unwrap().take();
            async move {
                if let Some(sub) = taken {
                    sub.disconnect();
                }
            }
        });
        *slot.lock().unwrap() = Some(sub);

        assert_eq!(bus.send(Signal::EntityRemoved { unique_id: uid("a") }).await, 1);
        assert_eq!(bus.handler_count(&topic), 0);
    }

    #[test]
    fn should_report_false_when_bus_is_gone() {
        let bus = SignalBus::new();
        let sub = bus.connect(SignalTopic::EntityRemoved(uid("a")), |_| async {});
        drop(bus);
        assert!(!sub.disconnect());
    }
}
