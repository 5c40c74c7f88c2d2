//! Bounded per-subscriber queue with newest-wins overflow

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tracing::trace;

use crate::event::Event;

pub(crate) enum Pop {
    Ready(Event),
    Empty,
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    events: VecDeque<Event>,
    closed: bool,
    dropped: u64,
}

/// Single-consumer queue owned by one subscription
#[derive(Debug)]
pub(crate) struct SubscriberQueue {
    id: u64,
    capacity: usize,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl SubscriberQueue {
    pub fn new(id: u64, capacity: usize) -> Self {
        Self {
            id,
            capacity: capacity.max(1),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Enqueue, evicting the oldest undelivered event when full.
    /// Returns false if the queue was already closed.
    pub fn offer(&self, event: Event) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            if state.events.len() >= self.capacity {
                state.events.pop_front();
                state.dropped += 1;
                trace!(
                    subscriber = self.id,
                    dropped = state.dropped,
                    "Queue full, dropped oldest event"
                );
            }
            state.events.push_back(event);
        }
        self.notify.notify_one();
        true
    }

    /// Stop accepting events; already queued events stay consumable
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Pop {
        let mut state = self.state.lock();
        match state.events.pop_front() {
            Some(event) => Pop::Ready(event),
            None if state.closed => Pop::Closed,
            None => Pop::Empty,
        }
    }

    /// Wait for the next event; `None` once closed and drained
    pub async fn pop(&self) -> Option<Event> {
        loop {
            match self.try_pop() {
                Pop::Ready(event) => return Some(event),
                Pop::Closed => return None,
                // notify_one stores a permit when nobody is waiting, so an
                // offer racing with this branch is not lost
                Pop::Empty => self.notify.notified().await,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}
