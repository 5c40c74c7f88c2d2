//! Event bus
//!
//! Typed fan-out from producers to independent consumers. Every subscriber
//! owns a bounded queue; a full queue evicts its oldest event so neither the
//! publisher nor other subscribers ever wait on a slow consumer. The bus
//! also keeps the latest event of each kind for passive polling.
//!
//! Producers running on foreign threads use [`EventBus::publish_threadsafe`],
//! which hands the event to a pump task on the runtime the bus was bound to.

mod queue;
mod subscription;

pub use subscription::Subscription;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use self::queue::SubscriberQueue;
use crate::cancellation::Shutdown;
use crate::config::DEFAULT_QUEUE_SIZE;
use crate::error::BusError;
use crate::event::{Event, EventKind};

/// Subscription key: one event kind, or everything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Kind(EventKind),
    All,
}

impl From<EventKind> for Topic {
    fn from(kind: EventKind) -> Self {
        Self::Kind(kind)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(kind) => f.write_str(kind.as_str()),
            Self::All => f.write_str("*"),
        }
    }
}

#[derive(Default)]
struct Registry {
    subscribers: HashMap<Topic, Vec<Arc<SubscriberQueue>>>,
    latest: HashMap<EventKind, Event>,
    closed: bool,
}

pub(crate) struct BusShared {
    capacity: usize,
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    handoff: Mutex<Option<mpsc::UnboundedSender<Event>>>,
    shutdown: Shutdown,
}

impl BusShared {
    fn publish(&self, event: Event) {
        let mut registry = self.registry.lock();
        if registry.closed {
            return;
        }
        let kind = event.kind();

        let Registry {
            subscribers,
            latest,
            ..
        } = &mut *registry;
        let targets = subscribers
            .get(&Topic::Kind(kind))
            .into_iter()
            .chain(subscribers.get(&Topic::All))
            .flatten();
        for queue in targets {
            queue.offer(event.clone());
        }
        trace!(kind = %kind, name = event.name(), "Published event");
        latest.insert(kind, event);
    }

    fn deregister(&self, topic: Topic, id: u64) {
        let mut registry = self.registry.lock();
        if let Some(queues) = registry.subscribers.get_mut(&topic) {
            queues.retain(|queue| queue.id() != id);
            if queues.is_empty() {
                registry.subscribers.remove(&topic);
            }
        }
        trace!(topic = %topic, subscriber = id, "Subscriber removed");
    }
}

/// Cloneable handle to one bus instance
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<BusShared>,
}

impl EventBus {
    /// Create a bus whose subscriber queues hold at most `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(BusShared {
                capacity: capacity.max(1),
                registry: Mutex::new(Registry::default()),
                next_id: AtomicU64::new(1),
                handoff: Mutex::new(None),
                shutdown: Shutdown::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Register a new queue for `topic`.
    ///
    /// On a closed bus the subscription is born closed and yields nothing.
    pub fn subscribe(&self, topic: impl Into<Topic>) -> Subscription {
        let topic = topic.into();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(SubscriberQueue::new(id, self.shared.capacity));

        let mut registry = self.shared.registry.lock();
        if registry.closed {
            queue.close();
        } else {
            registry
                .subscribers
                .entry(topic)
                .or_default()
                .push(queue.clone());
            debug!(topic = %topic, subscriber = id, "Subscriber added");
        }
        drop(registry);

        Subscription::new(topic, queue, Arc::downgrade(&self.shared))
    }

    /// Deliver to every subscriber of the event's kind and of `Topic::All`,
    /// and record it as the latest of its kind. No-op once closed.
    pub fn publish(&self, event: Event) {
        self.shared.publish(event);
    }

    /// Bind the bus to the current tokio runtime.
    ///
    /// Spawns the pump task that drains [`EventBus::publish_threadsafe`]
    /// hand-offs. Must be called from within a runtime, once.
    pub fn bind(&self) -> Result<(), BusError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| BusError::InvalidState("bind called outside a tokio runtime"))?;

        let mut handoff = self.shared.handoff.lock();
        if handoff.is_some() {
            return Err(BusError::InvalidState("bus is already bound"));
        }
        if self.is_closed() {
            return Err(BusError::InvalidState("bus is closed"));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let bus: Weak<BusShared> = Arc::downgrade(&self.shared);
        let cancel = self.shared.shutdown.child_token();
        handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = rx.recv() => {
                        let Some(event) = next else { break };
                        let Some(bus) = bus.upgrade() else { break };
                        bus.publish(event);
                    }
                }
            }
            debug!("Bus hand-off pump stopped");
        });

        *handoff = Some(tx);
        debug!("Event bus bound to runtime");
        Ok(())
    }

    /// Publish from any thread.
    ///
    /// Fails with [`BusError::InvalidState`] if the bus was never bound. A
    /// hand-off that cannot be delivered (runtime gone) is logged and
    /// dropped. After [`EventBus::close`] this is a silent no-op.
    pub fn publish_threadsafe(&self, event: Event) -> Result<(), BusError> {
        let handoff = self.shared.handoff.lock();
        let Some(tx) = handoff.as_ref() else {
            if self.is_closed() {
                return Ok(());
            }
            return Err(BusError::InvalidState(
                "publish_threadsafe called before the bus was bound to a runtime",
            ));
        };
        if let Err(e) = tx.send(event) {
            warn!(name = e.0.name(), "Bus hand-off closed, dropping event");
        }
        Ok(())
    }

    /// Most recent event of `kind`, without consuming it
    pub fn latest(&self, kind: EventKind) -> Option<Event> {
        self.shared.registry.lock().latest.get(&kind).cloned()
    }

    /// Number of live subscriptions registered under `topic`
    pub fn subscriber_count(&self, topic: impl Into<Topic>) -> usize {
        self.shared
            .registry
            .lock()
            .subscribers
            .get(&topic.into())
            .map_or(0, Vec::len)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.registry.lock().closed
    }

    /// Stop accepting events and release every subscription.
    ///
    /// Subscribers can still drain what was already queued; their `recv`
    /// then returns `None`.
    pub fn close(&self) {
        let queues: Vec<Arc<SubscriberQueue>> = {
            let mut registry = self.shared.registry.lock();
            if registry.closed {
                return;
            }
            registry.closed = true;
            registry
                .subscribers
                .drain()
                .flat_map(|(_, queues)| queues)
                .collect()
        };
        for queue in &queues {
            queue.close();
        }
        self.shared.handoff.lock().take();
        self.shared.shutdown.request();
        debug!(subscribers = queues.len(), "Event bus closed");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.shared.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
