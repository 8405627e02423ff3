//! The sync engine.
//!
//! One long-lived relay subscription covers the account: own events
//! (both kinds) plus inbound shares addressed to it, resumed from the
//! index watermark. Every arriving event runs the same pipeline:
//! dedupe by id, verify, decrypt, parse, project, notify. An event
//! that fails anywhere along the pipeline is dropped and never
//! partially projected.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use common::crypto::PublicKey;
use common::event::{Event, DELETE_KIND, DRIVE_KIND};
use common::item::{DriveItem, ItemContent};
use index::{DriveRecord, EventIndex, IndexError, RecordQuery};

use crate::changes::{ChangeFeed, ChangeKind};
use crate::error::DriveError;
use crate::relay::{Filter, RelayClient, Subscription};
use crate::signer::Signer;

const RESUBSCRIBE_DELAY: Duration = Duration::from_millis(500);

/// Engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Subscribing,
    Live,
    Reconnecting,
    Stopped,
}

/// The shared ingest pipeline, used by the live subscription and by
/// manual re-queries alike.
pub(crate) struct Ingestor<S> {
    signer: Arc<S>,
    index: EventIndex,
    changes: ChangeFeed,
}

impl<S> Clone for Ingestor<S> {
    fn clone(&self) -> Self {
        Self {
            signer: self.signer.clone(),
            index: self.index.clone(),
            changes: self.changes.clone(),
        }
    }
}

impl<S: Signer> Ingestor<S> {
    /// Run one event through the pipeline. Failures are logged and
    /// swallowed; a single bad event must never stop the stream.
    pub(crate) async fn ingest(&self, event: &Event) {
        match self.apply(event).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(id = %event.id, "event dropped"),
            Err(err) => tracing::warn!(id = %event.id, "index error during ingest: {}", err),
        }
    }

    async fn apply(&self, event: &Event) -> Result<bool, IndexError> {
        if self.index.contains(&event.id).await? {
            return Ok(false);
        }
        // A tombstone may have arrived before its target; keep the
        // target dead on late arrival.
        if let Some(author) = self.index.tombstone_author(&event.id).await? {
            if author == event.pubkey {
                return Ok(false);
            }
        }
        if event.verify().is_err() {
            return Ok(false);
        }
        match event.kind {
            DELETE_KIND => self.apply_delete(event).await,
            DRIVE_KIND => self.apply_drive(event).await,
            _ => Ok(false),
        }
    }

    async fn apply_delete(&self, event: &Event) -> Result<bool, IndexError> {
        for target in event.e_tags() {
            self.index.add_tombstone(target, &event.pubkey).await?;
            if let Some(record) = self.index.get(target).await? {
                // A tombstone only removes events by its own author.
                if record.author() == event.pubkey {
                    let path = record.path().to_string();
                    self.index.remove(target).await?;
                    self.changes.emit(ChangeKind::Deleted, Some(path));
                }
            }
        }
        Ok(true)
    }

    async fn apply_drive(&self, event: &Event) -> Result<bool, IndexError> {
        let sender = match PublicKey::from_hex(&event.pubkey) {
            Ok(pk) => pk,
            Err(_) => return Ok(false),
        };
        let plaintext = match self.signer.open(&event.content, &sender).await {
            Ok(plaintext) => plaintext,
            Err(_) => return Ok(false),
        };
        let content: ItemContent = match serde_json::from_slice(&plaintext) {
            Ok(content) => content,
            Err(_) => return Ok(false),
        };
        if !common::path::is_absolute(content.path()) {
            return Ok(false);
        }
        if DriveItem::from_content(&event.id, event.created_at, &content).is_err() {
            return Ok(false);
        }

        let me = self.signer.public_key().to_hex();
        let path = content.path().to_string();
        let existing = self
            .index
            .query(
                RecordQuery::new()
                    .item_type(content.type_name())
                    .path(&path),
            )
            .await?
            .iter()
            .any(|r| r.accessible_to(&me));

        let record = DriveRecord {
            shared_with: event.p_tags().first().map(|s| s.to_string()),
            original_event_id: None,
            nostr_event: event.clone(),
            decrypted_content: content,
        };
        self.index.put(&record).await?;
        self.changes.emit(
            if existing {
                ChangeKind::Updated
            } else {
                ChangeKind::Added
            },
            Some(path),
        );
        Ok(true)
    }
}

/// The sync engine owning the live subscription task.
pub struct SyncEngine<S, R: RelayClient> {
    signer: Arc<S>,
    relay: R,
    index: EventIndex,
    changes: ChangeFeed,
    state: Arc<watch::Sender<EngineState>>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Signer, R: RelayClient> SyncEngine<S, R> {
    pub fn new(signer: Arc<S>, relay: R, index: EventIndex, changes: ChangeFeed) -> Self {
        Self {
            signer,
            relay,
            index,
            changes,
            state: Arc::new(watch::channel(EngineState::Idle).0),
            shutdown: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    fn ingestor(&self) -> Ingestor<S> {
        Ingestor {
            signer: self.signer.clone(),
            index: self.index.clone(),
            changes: self.changes.clone(),
        }
    }

    /// Open the subscription from the current watermark and spawn the
    /// reader task. A second start on a running engine is a no-op.
    pub async fn start(&self) -> Result<(), DriveError> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return Ok(());
        }
        self.state.send_replace(EngineState::Subscribing);

        let me = self.signer.public_key().to_hex();
        let sub = open_subscription(&self.relay, &self.index, &me).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown.lock().await = Some(shutdown_tx);

        let ingestor = self.ingestor();
        let relay = self.relay.clone();
        let index = self.index.clone();
        let state = self.state.clone();
        *task = Some(tokio::spawn(async move {
            run_loop(sub, shutdown_rx, ingestor, relay, index, me, state).await;
        }));

        self.state.send_replace(EngineState::Live);
        tracing::info!("sync engine live");
        Ok(())
    }

    /// Signal the reader task and wait for it to drain. Lock order
    /// matches `start` (task, then shutdown).
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        if let Some(shutdown) = self.shutdown.lock().await.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = task.take() {
            let _ = task.await;
        }
        self.state.send_replace(EngineState::Stopped);
        tracing::info!("sync engine stopped");
    }

    /// Restart the subscription for the current signer identity. The
    /// index is per-account, so only the subscription is rebuilt.
    pub async fn on_account_changed(&self) -> Result<(), DriveError> {
        self.stop().await;
        self.start().await
    }

    /// Re-query history since the watermark through the normal ingest
    /// path. Duplicate suppression by event id makes this idempotent.
    pub async fn sync_now(&self) -> Result<(), DriveError> {
        let me = self.signer.public_key().to_hex();
        let since = self.index.watermark().await?;
        let events = self
            .relay
            .query(sync_filters(&me, since))
            .await
            .map_err(DriveError::network)?;
        let ingestor = self.ingestor();
        for event in &events {
            ingestor.ingest(event).await;
        }
        Ok(())
    }
}

fn sync_filters(me: &str, since: Option<u64>) -> Vec<Filter> {
    let mut own = Filter::new()
        .kinds([DRIVE_KIND, DELETE_KIND])
        .authors([me.to_string()]);
    let mut shares = Filter::new()
        .kinds([DRIVE_KIND])
        .p_tags([me.to_string()]);
    if let Some(since) = since {
        own = own.since(since);
        shares = shares.since(since);
    }
    vec![own, shares]
}

async fn open_subscription<R: RelayClient>(
    relay: &R,
    index: &EventIndex,
    me: &str,
) -> Result<Subscription, DriveError> {
    let since = index.watermark().await?;
    relay
        .subscribe(sync_filters(me, since))
        .await
        .map_err(DriveError::network)
}

async fn run_loop<S: Signer, R: RelayClient>(
    mut sub: Subscription,
    mut shutdown: watch::Receiver<bool>,
    ingestor: Ingestor<S>,
    relay: R,
    index: EventIndex,
    me: String,
    state: Arc<watch::Sender<EngineState>>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            msg = sub.recv_async() => match msg {
                Ok(event) => ingestor.ingest(&event).await,
                Err(_) => {
                    state.send_replace(EngineState::Reconnecting);
                    tracing::warn!("subscription lost, reconnecting");
                    sub = match reconnect(&relay, &index, &me, &mut shutdown).await {
                        Some(sub) => sub,
                        None => break,
                    };
                    state.send_replace(EngineState::Live);
                }
            }
        }
    }
}

async fn reconnect<R: RelayClient>(
    relay: &R,
    index: &EventIndex,
    me: &str,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<Subscription> {
    loop {
        if *shutdown.borrow() {
            return None;
        }
        match open_subscription(relay, index, me).await {
            Ok(sub) => return Some(sub),
            Err(err) => {
                tracing::warn!("resubscribe failed: {}", err);
                tokio::select! {
                    _ = shutdown.changed() => return None,
                    _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => {}
                }
            }
        }
    }
}
