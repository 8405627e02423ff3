//! An in-memory relay double.
//!
//! Stores every published event and echoes broadcasts back to matching
//! subscriptions, which is exactly what the engine sees against a real
//! relay: replay of stored history first, then live events.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use common::event::Event;

use crate::relay::{Filter, RelayClient, Subscription};

#[derive(Debug, thiserror::Error)]
pub enum MemoryRelayError {
    #[error("memory relay error: {0}")]
    Internal(String),
}

struct Subscriber {
    filters: Vec<Filter>,
    sender: flume::Sender<Event>,
}

#[derive(Default)]
struct RelayState {
    events: Vec<Event>,
    subscribers: Vec<Subscriber>,
}

/// A process-local relay shared by every client cloned from it.
#[derive(Clone, Default)]
pub struct MemoryRelay {
    inner: Arc<RwLock<RelayState>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event the relay has accepted, in arrival order.
    pub fn stored_events(&self) -> Vec<Event> {
        self.inner.read().events.clone()
    }

    fn lock(&self) -> parking_lot::RwLockWriteGuard<'_, RelayState> {
        self.inner.write()
    }
}

#[async_trait]
impl RelayClient for MemoryRelay {
    type Error = MemoryRelayError;

    async fn publish(&self, event: &Event) -> Result<(), Self::Error> {
        let mut state = self.lock();
        if state.events.iter().any(|e| e.id == event.id) {
            return Ok(());
        }
        state.events.push(event.clone());
        state.subscribers.retain(|sub| {
            if sub.filters.iter().any(|f| f.matches(event)) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                !sub.sender.is_disconnected()
            }
        });
        Ok(())
    }

    async fn subscribe(&self, filters: Vec<Filter>) -> Result<Subscription, Self::Error> {
        let (sender, receiver) = flume::unbounded();
        let mut state = self.lock();
        for event in &state.events {
            if filters.iter().any(|f| f.matches(event)) {
                let _ = sender.send(event.clone());
            }
        }
        state.subscribers.push(Subscriber { filters, sender });
        Ok(receiver)
    }

    async fn query(&self, filters: Vec<Filter>) -> Result<Vec<Event>, Self::Error> {
        let state = self.inner.read();
        Ok(state
            .events
            .iter()
            .filter(|e| filters.iter().any(|f| f.matches(e)))
            .cloned()
            .collect())
    }

    async fn open_scoped(&self, _relays: &[String]) -> Result<Self, Self::Error> {
        // Every scoped client shares the same process-local store.
        Ok(self.clone())
    }

    async fn close(&self) {}
}
