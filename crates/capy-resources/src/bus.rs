//! Change bus for cross-thread notification.
//!
//! Design principles:
//! - One bounded queue (tokio mpsc) per subscription
//! - Topics are plain strings, producers invent them as they need
//! - Topic filtering happens on publish, so busy topics never crowd out
//!   the ones a subscription asked for
//! - Best effort: nothing is queued when nobody listens
//! - A subscription unregisters itself when dropped
//!
//! A subscription whose queue overflowed gets one [`RESYNC_TOPIC`] event
//! once it has drained what was queued; it should re-read the store.
//!
//! This underlies long-poll "watch" consumers: subscribe, await `next`,
//! drop the subscription when the consumer goes away.

use log::debug;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// Queue capacity of one subscription.
pub const CHANNEL_CAPACITY: usize = 64;

/// Topic of the event telling a lagging subscription that it missed changes.
pub const RESYNC_TOPIC: &str = "resync";

/// One publication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub topic: String,
    pub payload: String,
}

impl Event {
    pub fn is_resync(&self) -> bool {
        self.topic == RESYNC_TOPIC
    }
}

struct Subscriber {
    /// Empty means all topics.
    topics: HashSet<String>,
    tx: mpsc::Sender<Arc<Event>>,
    lagged: Arc<AtomicBool>,
}

impl Subscriber {
    fn wants(&self, topic: &str) -> bool {
        self.topics.is_empty() || self.topics.contains(topic)
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct ChangeBus {
    registry: Arc<Mutex<Registry>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish without blocking. Returns false when no subscription wanted
    /// the topic and the event was dropped.
    pub fn publish(&self, topic: impl Into<String>, payload: impl Into<String>) -> bool {
        let event = Arc::new(Event {
            topic: topic.into(),
            payload: payload.into(),
        });

        let registry = lock(&self.registry);
        let mut delivered = false;
        for (id, sub) in registry.subscribers.iter().filter(|(_, s)| s.wants(&event.topic)) {
            match sub.tx.try_send(Arc::clone(&event)) {
                Ok(()) => delivered = true,
                Err(TrySendError::Full(_)) => {
                    if !sub.lagged.swap(true, Ordering::AcqRel) {
                        debug!("Subscription {} lagged at {}", id, event.topic);
                    }
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        if !delivered {
            debug!("No subscribers, dropping {}", event.topic);
        }
        delivered
    }

    /// Subscribe to every topic.
    pub fn subscribe(&self) -> Subscription {
        self.register(HashSet::new())
    }

    /// Subscribe to the given topics only.
    pub fn subscribe_to<I, S>(&self, topics: I) -> Subscription
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register(topics.into_iter().map(Into::into).collect())
    }

    fn register(&self, topics: HashSet<String>) -> Subscription {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let lagged = Arc::new(AtomicBool::new(false));

        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(
            id,
            Subscriber {
                topics,
                tx,
                lagged: Arc::clone(&lagged),
            },
        );

        Subscription {
            id,
            rx,
            lagged,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).subscribers.len()
    }
}

/// A registered listener. Dropping it releases the registration.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Arc<Event>>,
    lagged: Arc<AtomicBool>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Also listen on `topic`.
    pub fn watch(&mut self, topic: impl Into<String>) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if let Some(sub) = lock(&registry).subscribers.get_mut(&self.id) {
            sub.topics.insert(topic.into());
        }
    }

    /// Wait for the next publication on a registered topic.
    /// Returns None once the bus is gone.
    pub async fn next(&mut self) -> Option<Arc<Event>> {
        match self.rx.try_recv() {
            Ok(event) => return Some(event),
            Err(TryRecvError::Disconnected) => return None,
            Err(TryRecvError::Empty) => {}
        }
        // The queue is drained, so everything still missing was dropped.
        if self.lagged.swap(false, Ordering::AcqRel) {
            return Some(Arc::new(Event {
                topic: RESYNC_TOPIC.to_string(),
                payload: String::new(),
            }));
        }
        self.rx.recv().await
    }

    /// Like [`Subscription::next`], but gives up when `cancel` completes.
    pub async fn next_until<F>(&mut self, cancel: F) -> Option<Arc<Event>>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            event = self.next() => event,
            _ = cancel => None,
        }
    }

    /// Long-poll helper: wait at most `timeout`.
    pub async fn next_timeout(&mut self, timeout: Duration) -> Option<Arc<Event>> {
        tokio::time::timeout(timeout, self.next())
            .await
            .ok()
            .flatten()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).subscribers.remove(&self.id);
        }
    }
}
