//! Change notifications for view consumers.
//!
//! Fan-out is broadcast: any number of consumers may subscribe, and a
//! slow consumer never back-pressures the engine. The buffer is
//! bounded; once it fills, the oldest notifications are dropped for
//! that consumer (`RecvError::Lagged` on the receiver). Closing the
//! feed ends every subscriber's stream once it drains.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tokio::sync::broadcast;

/// What happened to the materialised view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Deleted,
    Updated,
    Shared,
}

/// One change notification, delivered in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: Option<String>,
    pub timestamp: u64,
}

/// The broadcast hub the engine and operations emit into. Clones share
/// one underlying channel, so closing any handle closes them all.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: Arc<RwLock<Option<broadcast::Sender<Change>>>>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx: Arc::new(RwLock::new(Some(tx))),
        }
    }

    /// Subscribe to future changes. On a closed feed the receiver
    /// reports end-of-stream immediately.
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        match self.tx.read().as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                rx
            }
        }
    }

    /// Emit a change. Fire-and-forget: having no subscribers, or a
    /// closed feed, is fine.
    pub fn emit(&self, kind: ChangeKind, path: Option<String>) {
        let change = Change {
            kind,
            path,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        if let Some(tx) = self.tx.read().as_ref() {
            let _ = tx.send(change);
        }
    }

    /// Close the feed. Subscribers drain buffered changes, then see
    /// the stream end.
    pub fn close(&self) {
        self.tx.write().take();
    }
}
