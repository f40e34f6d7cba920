//! In-process publish/subscribe bus keyed by topic name.
//!
//! Delivery is synchronous: `publish` runs every listener registered on the
//! topic, in subscription order, on the caller's thread before returning.
//! The listener list is snapshotted before delivery and no lock is held while
//! a handler runs, so handlers may publish, subscribe or unsubscribe freely.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{error, trace};

/// Callback invoked with a reference to the published payload.
pub type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Every,
    Once,
}

/// Handle returned by `subscribe`; pass it back to `unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("handler {subscription} on topic `{topic}` panicked: {message}")]
    HandlerPanicked {
        topic: String,
        subscription: u64,
        message: String,
    },
}

/// Outcome of a single `publish` call.
#[derive(Debug, Default)]
pub struct PublishReport {
    pub delivered: usize,
    pub failures: Vec<BusError>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub trait Bus<P>: Send + Sync {
    fn subscribe(&self, topic: &str, handler: Handler<P>) -> Subscription;
    fn subscribe_once(&self, topic: &str, handler: Handler<P>) -> Subscription;
    fn unsubscribe(&self, subscription: &Subscription) -> bool;
    fn publish(&self, topic: &str, payload: P) -> PublishReport;
    fn clear_all(&self);
}

/// Closure-taking conveniences, available on `dyn Bus<P>` as well.
pub trait BusExt<P>: Bus<P> {
    fn on<F>(&self, topic: &str, f: F) -> Subscription
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.subscribe(topic, Arc::new(f))
    }

    fn once<F>(&self, topic: &str, f: F) -> Subscription
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.subscribe_once(topic, Arc::new(f))
    }
}

impl<P, B: Bus<P> + ?Sized> BusExt<P> for B {}

struct Listener<P> {
    id: u64,
    delivery: Delivery,
    active: AtomicBool,
    handler: Handler<P>,
}

impl<P> Listener<P> {
    /// Once-listeners are claimed by exactly one publish, even across threads.
    fn claim(&self) -> bool {
        match self.delivery {
            Delivery::Every => self.active.load(Ordering::Acquire),
            Delivery::Once => self.active.swap(false, Ordering::AcqRel),
        }
    }
}

/// Simple in-memory bus shared by every light and observer in the process.
pub struct LocalBus<P> {
    topics: RwLock<HashMap<String, Vec<Arc<Listener<P>>>>>,
    next_id: AtomicU64,
}

impl<P> Default for LocalBus<P> {
    fn default() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<P> fmt::Debug for LocalBus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.topics.read();
        let mut map = f.debug_map();
        for (topic, listeners) in guard.iter() {
            map.entry(topic, &listeners.len());
        }
        map.finish()
    }
}

impl<P> LocalBus<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, Vec::len)
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    fn register(&self, topic: &str, handler: Handler<P>, delivery: Delivery) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener = Arc::new(Listener {
            id,
            delivery,
            active: AtomicBool::new(true),
            handler,
        });
        self.topics
            .write()
            .entry(topic.to_string())
            .or_default()
            .push(listener);
        trace!(topic, subscription = id, ?delivery, "subscribed");
        Subscription {
            topic: topic.to_string(),
            id,
        }
    }

    fn remove(&self, topic: &str, id: u64) -> bool {
        let mut guard = self.topics.write();
        let Some(listeners) = guard.get_mut(topic) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|listener| {
            if listener.id == id {
                listener.active.store(false, Ordering::Release);
                false
            } else {
                true
            }
        });
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            guard.remove(topic);
        }
        removed
    }
}

impl<P: Send + Sync> Bus<P> for LocalBus<P> {
    fn subscribe(&self, topic: &str, handler: Handler<P>) -> Subscription {
        self.register(topic, handler, Delivery::Every)
    }

    fn subscribe_once(&self, topic: &str, handler: Handler<P>) -> Subscription {
        self.register(topic, handler, Delivery::Once)
    }

    fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.remove(&subscription.topic, subscription.id)
    }

    fn publish(&self, topic: &str, payload: P) -> PublishReport {
        let snapshot = match self.topics.read().get(topic) {
            Some(listeners) => listeners.clone(),
            None => return PublishReport::default(),
        };

        let mut report = PublishReport::default();
        for listener in snapshot {
            if !listener.claim() {
                continue;
            }
            if listener.delivery == Delivery::Once {
                self.remove(topic, listener.id);
            }

            let handler = &listener.handler;
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&payload))) {
                Ok(()) => report.delivered += 1,
                Err(cause) => {
                    let message = panic_message(cause.as_ref());
                    error!(
                        topic,
                        subscription = listener.id,
                        error = %message,
                        "signal handler panicked"
                    );
                    report.failures.push(BusError::HandlerPanicked {
                        topic: topic.to_string(),
                        subscription: listener.id,
                        message,
                    });
                }
            }
        }
        report
    }

    fn clear_all(&self) {
        let mut guard = self.topics.write();
        for listener in guard.values().flatten() {
            listener.active.store(false, Ordering::Release);
        }
        guard.clear();
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(text) = cause.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = cause.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
