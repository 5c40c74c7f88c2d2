//! Subscription handle
//!
//! Owns one subscriber queue. Dropping the handle (or calling
//! [`Subscription::unsubscribe`]) deregisters it from the bus.

use futures::Stream;
use std::sync::{Arc, Weak};

use super::queue::{Pop, SubscriberQueue};
use super::{BusShared, Topic};
use crate::event::Event;

pub struct Subscription {
    topic: Topic,
    queue: Arc<SubscriberQueue>,
    bus: Weak<BusShared>,
    registered: bool,
}

impl Subscription {
    pub(super) fn new(topic: Topic, queue: Arc<SubscriberQueue>, bus: Weak<BusShared>) -> Self {
        Self {
            topic,
            queue,
            bus,
            registered: true,
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the subscription is closed (bus closed or
    /// unsubscribed) and every queued event has been consumed.
    pub async fn recv(&mut self) -> Option<Event> {
        self.queue.pop().await
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Option<Event> {
        match self.queue.try_pop() {
            Pop::Ready(event) => Some(event),
            Pop::Empty | Pop::Closed => None,
        }
    }

    /// Events queued and not yet received
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Events evicted by overflow so far
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// Deregister from the bus. Idempotent.
    pub fn unsubscribe(&mut self) {
        if !self.registered {
            return;
        }
        self.registered = false;
        if let Some(bus) = self.bus.upgrade() {
            bus.deregister(self.topic, self.queue.id());
        }
        self.queue.close();
    }

    pub fn into_stream(self) -> impl Stream<Item = Event> + Send {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|event| (event, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.queue.id())
            .field("pending", &self.queue.len())
            .finish()
    }
}
