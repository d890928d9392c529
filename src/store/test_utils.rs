use crate::core::{Subscriber, SubscriberStore};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory subscriber store for testing
pub struct InMemorySubscriberStore {
    subscribers: Mutex<Vec<Subscriber>>,
    failing: AtomicBool,
    lookups: AtomicUsize,
}

impl InMemorySubscriberStore {
    pub fn new(subscribers: Vec<Subscriber>) -> Self {
        Self {
            subscribers: Mutex::new(subscribers),
            failing: AtomicBool::new(false),
            lookups: AtomicUsize::new(0),
        }
    }

    /// A store whose lookups always fail
    pub fn failing() -> Self {
        let store = Self::new(Vec::new());
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn add(&self, subscriber: Subscriber) {
        self.subscribers.lock().unwrap().push(subscriber);
    }

    /// Get the number of times the subscriber list was read
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriberStore for InMemorySubscriberStore {
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("subscriber store unavailable"));
        }
        let subscribers = self.subscribers.lock().unwrap();
        Ok(subscribers.iter().filter(|s| s.active).cloned().collect())
    }
}
