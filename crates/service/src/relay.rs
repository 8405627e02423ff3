//! The relay network collaborator.
//!
//! A relay stores signed events and serves subscriptions; it is
//! untrusted. The engine drives one long-lived subscription; the
//! share-access path opens a throwaway client scoped to the pointer's
//! hint relays.

use std::fmt::{Debug, Display};

use async_trait::async_trait;

use common::event::Event;

/// A subscription filter. Empty vectors match everything; the set
/// conditions are conjoined. A subscription carries several filters
/// unioned server-side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub ids: Vec<String>,
    pub authors: Vec<String>,
    pub kinds: Vec<u32>,
    pub p_tags: Vec<String>,
    pub since: Option<u64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.ids = ids.into_iter().collect();
        self
    }

    pub fn authors(mut self, authors: impl IntoIterator<Item = String>) -> Self {
        self.authors = authors.into_iter().collect();
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = u32>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn p_tags(mut self, p_tags: impl IntoIterator<Item = String>) -> Self {
        self.p_tags = p_tags.into_iter().collect();
        self
    }

    pub fn since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    /// Whether an event satisfies this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.ids.is_empty() && !self.ids.iter().any(|id| id == &event.id) {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.iter().any(|a| a == &event.pubkey) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if !self.p_tags.is_empty()
            && !self.p_tags.iter().any(|p| event.is_addressed_to(p))
        {
            return false;
        }
        if let Some(since) = self.since {
            if event.created_at < since {
                return false;
            }
        }
        true
    }
}

/// A live event stream for one subscription.
pub type Subscription = flume::Receiver<Event>;

/// The relay network.
#[async_trait]
pub trait RelayClient: Send + Sync + Clone + 'static {
    type Error: Display + Debug + Send + Sync;

    /// Broadcast a signed event.
    async fn publish(&self, event: &Event) -> Result<(), Self::Error>;

    /// Open a subscription matching any of `filters`. Stored events
    /// are replayed first, then live events follow.
    async fn subscribe(&self, filters: Vec<Filter>) -> Result<Subscription, Self::Error>;

    /// One-shot historical query.
    async fn query(&self, filters: Vec<Filter>) -> Result<Vec<Event>, Self::Error>;

    /// Open a scratch client scoped to specific relays. The caller
    /// must `close` it on every exit path.
    async fn open_scoped(&self, relays: &[String]) -> Result<Self, Self::Error>;

    /// Tear the client down.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::crypto::SecretKey;
    use common::event::{EventBuilder, DRIVE_KIND};

    #[test]
    fn filter_matching() {
        let key = SecretKey::generate();
        let event = EventBuilder::drive("body".to_string())
            .recipient("cafe")
            .created_at(100)
            .sign(&key)
            .unwrap();

        assert!(Filter::new().matches(&event));
        assert!(Filter::new().kinds([DRIVE_KIND]).matches(&event));
        assert!(!Filter::new().kinds([5]).matches(&event));
        assert!(Filter::new()
            .authors([key.public().to_hex()])
            .matches(&event));
        assert!(!Filter::new().authors(["00".repeat(32)]).matches(&event));
        assert!(Filter::new().p_tags(["cafe".to_string()]).matches(&event));
        assert!(!Filter::new().p_tags(["beef".to_string()]).matches(&event));
        assert!(Filter::new().since(100).matches(&event));
        assert!(!Filter::new().since(101).matches(&event));
        assert!(Filter::new().ids([event.id.clone()]).matches(&event));
    }
}
