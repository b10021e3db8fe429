//! In-process event bus with bounded per-subscriber mailboxes.
//!
//! `tokio::sync::broadcast` reports lagging as a count but not as an event
//! subscribers can act on, and a single slow subscriber can force the
//! channel to retain history for everyone else. Instead each subscriber
//! gets its own bounded mailbox; when it's full the oldest pending event
//! is dropped to make room for the new one and a `bus/overflow`
//! notification is queued in its place.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, RwLock};

use minihub_domain::error::MiniHubError;
use minihub_domain::event::Event;

use crate::ports::EventPublisher;

/// Default bounded mailbox size per subscriber.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

struct Mailbox {
    queue: Mutex<VecDeque<Event>>,
    notify: Notify,
    capacity: usize,
    dropped: Arc<AtomicU64>,
}

impl Mailbox {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    fn push(&self, event: Event) {
        let mut queue = self.queue.lock().expect("mailbox mutex poisoned");
        if queue.len() >= self.capacity {
            queue.pop_front();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            // Room for the overflow marker plus the event itself.
            while queue.len() + 1 >= self.capacity {
                queue.pop_front();
            }
            queue.push_back(Event::bus_overflow(dropped));
        }
        queue.push_back(event);
        drop(queue);
        self.notify.notify_waiters();
    }
}

/// A per-subscriber handle for receiving events from an [`InProcessEventBus`].
pub struct EventSubscription {
    mailbox: Arc<Mailbox>,
}

impl EventSubscription {
    /// Receive the next event, waiting if the mailbox is currently empty.
    pub async fn recv(&mut self) -> Event {
        loop {
            if let Some(event) = self.try_recv() {
                return event;
            }
            self.mailbox.notify.notified().await;
        }
    }

    /// Receive the next event without waiting, if one is available.
    #[must_use]
    pub fn try_recv(&mut self) -> Option<Event> {
        self.mailbox
            .queue
            .lock()
            .expect("mailbox mutex poisoned")
            .pop_front()
    }

    /// Count of events dropped for this subscriber due to overflow.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.mailbox.dropped.load(Ordering::Relaxed)
    }
}

/// In-process event bus with drop-oldest, bounded-mailbox delivery.
pub struct InProcessEventBus {
    subscribers: RwLock<Vec<Arc<Mailbox>>>,
    mailbox_capacity: usize,
}

impl InProcessEventBus {
    /// Create a new event bus whose subscribers each get a mailbox of
    /// `mailbox_capacity` events.
    #[must_use]
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            mailbox_capacity,
        }
    }

    /// Subscribe to events published after this call.
    pub async fn subscribe(&self) -> EventSubscription {
        let mailbox = Arc::new(Mailbox::new(self.mailbox_capacity));
        self.subscribers.write().await.push(Arc::clone(&mailbox));
        EventSubscription { mailbox }
    }
}

impl EventPublisher for InProcessEventBus {
    async fn publish(&self, event: Event) -> Result<(), MiniHubError> {
        let subscribers = self.subscribers.read().await;
        for mailbox in subscribers.iter() {
            mailbox.push(event.clone());
        }
        Ok(())
    }
}
