//! The drive operations handle.
//!
//! One handle owns the signer, the relay client, the blob client, the
//! local index, the change feed, and the sync engine; all state passes
//! through it. Read operations (`list`, `search`, `get_file_versions`)
//! query the index exclusively and never touch the network.
//!
//! Every mutation is an event emission: the record is upserted locally
//! first, then broadcast. A failed broadcast is surfaced but the local
//! write stands, so the event lives locally until republished.

mod share;

pub use share::{decode_share_key, parse_share_link, SharedFileAccess};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::broadcast;

use common::event::EventBuilder;
use common::item::{self, DriveItem, FileMetadata, FolderMetadata, ItemContent};
use common::{crypto::secret::ContentSecret, path};
use index::{DriveRecord, EventIndex, RecordQuery};

use crate::blobs::BlobClient;
use crate::changes::{Change, ChangeFeed, ChangeKind};
use crate::config::Config;
use crate::engine::{EngineState, SyncEngine};
use crate::error::DriveError;
use crate::relay::RelayClient;
use crate::signer::Signer;

pub(crate) struct DriveInner<S, R: RelayClient, B> {
    pub(crate) signer: Arc<S>,
    pub(crate) relay: R,
    pub(crate) blobs: B,
    pub(crate) index: EventIndex,
    pub(crate) changes: ChangeFeed,
    pub(crate) engine: SyncEngine<S, R>,
    pub(crate) config: Config,
    disposed: AtomicBool,
}

/// The drive handle.
pub struct Drive<S, R: RelayClient, B> {
    pub(crate) inner: Arc<DriveInner<S, R, B>>,
}

impl<S, R: RelayClient, B> Clone for Drive<S, R, B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S, R, B> Drive<S, R, B>
where
    S: Signer,
    R: RelayClient,
    B: BlobClient,
{
    /// Build a handle. The index is namespaced per account: a data
    /// directory gets one database file per signer public key, no
    /// directory means an in-memory index.
    pub async fn new(signer: S, relay: R, blobs: B, config: Config) -> Result<Self, DriveError> {
        let signer = Arc::new(signer);
        let index = match &config.data_dir {
            Some(dir) => {
                let db = dir.join(format!("{}.db", signer.public_key().to_hex()));
                EventIndex::open(db).await?
            }
            None => EventIndex::in_memory().await?,
        };
        let changes = ChangeFeed::new(config.change_buffer);
        let engine = SyncEngine::new(
            signer.clone(),
            relay.clone(),
            index.clone(),
            changes.clone(),
        );
        Ok(Self {
            inner: Arc::new(DriveInner {
                signer,
                relay,
                blobs,
                index,
                changes,
                engine,
                config,
                disposed: AtomicBool::new(false),
            }),
        })
    }

    /// Start the sync engine.
    pub async fn start(&self) -> Result<(), DriveError> {
        self.ensure_live()?;
        self.inner.engine.start().await
    }

    /// Stop the sync engine.
    pub async fn stop(&self) {
        self.inner.engine.stop().await;
    }

    /// Await a best-effort quiescence point with the relays.
    pub async fn sync_now(&self) -> Result<(), DriveError> {
        self.ensure_live()?;
        self.inner.engine.sync_now().await
    }

    /// Restart the subscription after the signer identity changed.
    pub async fn on_account_changed(&self) -> Result<(), DriveError> {
        self.ensure_live()?;
        self.inner.engine.on_account_changed().await
    }

    pub fn engine_state(&self) -> EngineState {
        self.inner.engine.state()
    }

    /// The identity this handle operates as.
    pub fn public_key(&self) -> common::crypto::PublicKey {
        self.inner.signer.public_key()
    }

    /// Subscribe to change notifications. The buffer is bounded; a
    /// consumer that falls behind loses the oldest entries.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<Change> {
        self.inner.changes.subscribe()
    }

    /// Stop the engine, close the change stream, and retire the
    /// handle. Subsequent operations return a terminal error.
    pub async fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.engine.stop().await;
        self.inner.changes.close();
    }

    /// List accessible items at `path`, reduced to current versions.
    ///
    /// With `recursive` the whole subtree is scanned; otherwise only
    /// direct children (and the item at `path` itself). A non-empty
    /// `mime_types` restricts the result to files of those types,
    /// case-insensitively.
    pub async fn list(
        &self,
        scope: &str,
        mime_types: &[String],
        recursive: bool,
    ) -> Result<Vec<DriveItem>, DriveError> {
        self.ensure_live()?;
        let scope = require_absolute(scope)?;
        let me = self.me();
        let records = self
            .inner
            .index
            .scan(|record| {
                if !record.accessible_to(&me) {
                    return false;
                }
                let item_path = record.path();
                let in_scope = if recursive {
                    item_path == scope || path::is_within(&scope, item_path)
                } else {
                    path::dirname(item_path) == scope
                };
                if !in_scope {
                    return false;
                }
                if mime_types.is_empty() {
                    return true;
                }
                match &record.decrypted_content {
                    ItemContent::File {
                        file_type: Some(file_type),
                        ..
                    } => mime_types.iter().any(|m| item::mime_matches(file_type, m)),
                    _ => false,
                }
            })
            .await?;

        let mut current = current_versions(records);
        current.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(current.iter().filter_map(|r| r.to_item()).collect())
    }

    /// All versions of the file at `path`, newest first.
    pub async fn get_file_versions(&self, file_path: &str) -> Result<Vec<FileMetadata>, DriveError> {
        self.ensure_live()?;
        let file_path = require_absolute(file_path)?;
        let me = self.me();
        let records = self
            .inner
            .index
            .query(RecordQuery::new().item_type("file").path(&file_path))
            .await?;
        Ok(records
            .into_iter()
            .filter(|r| r.accessible_to(&me))
            .filter_map(|r| r.to_item())
            .filter_map(|i| match i {
                DriveItem::File(f) => Some(f),
                DriveItem::Folder(_) => None,
            })
            .collect())
    }

    /// Create a folder. Creating an existing folder is a no-op that
    /// returns the existing entry.
    pub async fn create_folder(&self, folder_path: &str) -> Result<FolderMetadata, DriveError> {
        self.ensure_live()?;
        let folder_path = require_absolute(folder_path)?;
        let me = self.me();
        let existing = self
            .inner
            .index
            .query(RecordQuery::new().item_type("folder").path(&folder_path))
            .await?
            .into_iter()
            .find(|r| r.accessible_to(&me));
        if let Some(record) = existing {
            return Ok(FolderMetadata {
                path: folder_path,
                created_at: record.created_at(),
                event_id: record.id().to_string(),
            });
        }

        let content = ItemContent::folder(&folder_path);
        let (event, _) = self.emit_drive_record(content, None, None).await?;
        self.inner
            .changes
            .emit(ChangeKind::Added, Some(folder_path.clone()));
        Ok(FolderMetadata {
            path: folder_path,
            created_at: event.created_at,
            event_id: event.id,
        })
    }

    /// Upload a file: encrypt (unless opted out), push the bytes to
    /// the blob network, and emit the file event. The metadata hash
    /// and size refer to the uploaded bytes, ciphertext included.
    pub async fn upload_file(
        &self,
        bytes: &[u8],
        file_path: &str,
        mime: Option<String>,
        encrypt: bool,
    ) -> Result<FileMetadata, DriveError> {
        self.ensure_live()?;
        let file_path = require_absolute(file_path)?;
        if let Some(mime) = &mime {
            if item::parse_mime(mime).is_none() {
                return Err(DriveError::InvalidArgument(format!(
                    "invalid MIME type: {mime}"
                )));
            }
        }
        let file_type = mime.or_else(|| item::detect_mime(&file_path).map(|m| m.to_string()));

        let (upload, secret) = if encrypt {
            let (ciphertext, secret) = common::crypto::secret::encrypt(bytes)?;
            (ciphertext, Some(secret))
        } else {
            (bytes.to_vec(), None)
        };
        let hash = hex::encode(Sha256::digest(&upload));
        let size = upload.len() as u64;

        self.inner
            .blobs
            .put(upload)
            .await
            .map_err(DriveError::network)?;

        let content = ItemContent::File {
            hash: hash.clone(),
            path: file_path.clone(),
            size,
            file_type: file_type.clone(),
            encryption_algorithm: secret
                .as_ref()
                .map(|_| common::crypto::CONTENT_ALGORITHM.to_string()),
            decryption_key: secret.as_ref().map(ContentSecret::key_base64),
            decryption_nonce: secret.as_ref().map(ContentSecret::nonce_base64),
        };
        let (event, _) = self.emit_drive_record(content, None, None).await?;
        self.inner
            .changes
            .emit(ChangeKind::Added, Some(file_path.clone()));

        Ok(FileMetadata {
            path: file_path,
            created_at: event.created_at,
            event_id: event.id,
            hash,
            size,
            file_type,
            encryption: secret.map(|s| common::item::EncryptionInfo {
                algorithm: common::crypto::CONTENT_ALGORITHM.to_string(),
                key: s.key_base64(),
                nonce: s.nonce_base64(),
            }),
        })
    }

    /// Fetch a blob and, when key material is supplied, decrypt it.
    pub async fn download_file(
        &self,
        hash: &str,
        key: Option<&str>,
        nonce: Option<&str>,
    ) -> Result<Vec<u8>, DriveError> {
        self.ensure_live()?;
        let blob = self
            .inner
            .blobs
            .get(hash)
            .await
            .map_err(DriveError::network)?;
        match (key, nonce) {
            (None, None) => Ok(blob),
            (Some(key), Some(nonce)) => {
                use base64::engine::general_purpose::STANDARD as BASE64;
                use base64::Engine as _;
                let key_bytes = BASE64.decode(key).map_err(DriveError::invalid)?;
                let nonce_bytes = BASE64.decode(nonce).map_err(DriveError::invalid)?;
                let sizes = DriveError::DecryptionFailed {
                    key_len: key_bytes.len(),
                    nonce_len: nonce_bytes.len(),
                };
                let secret =
                    ContentSecret::from_bytes(&key_bytes, &nonce_bytes).map_err(|_| sizes)?;
                secret
                    .decrypt(&blob)
                    .map_err(|_| DriveError::DecryptionFailed {
                        key_len: key_bytes.len(),
                        nonce_len: nonce_bytes.len(),
                    })
            }
            _ => Err(DriveError::InvalidArgument(
                "decryption key and nonce must be supplied together".to_string(),
            )),
        }
    }

    /// Delete a single event by id. Deleting an unknown id is a no-op.
    pub async fn delete_by_id(&self, event_id: &str) -> Result<(), DriveError> {
        self.ensure_live()?;
        let Some(record) = self.inner.index.get(event_id).await? else {
            return Ok(());
        };
        if record.author() != self.me() {
            return Err(DriveError::Unauthorized(
                "cannot delete an event authored by someone else".to_string(),
            ));
        }
        self.remove_records(vec![record], true).await
    }

    /// Delete everything of mine at `path`; folders cascade over the
    /// subtree. One `deleted` change is emitted for the root path
    /// after the children are gone.
    pub async fn delete_by_path(&self, target: &str) -> Result<(), DriveError> {
        self.ensure_live()?;
        let target = require_absolute(target)?;
        let me = self.me();

        let roots = self
            .inner
            .index
            .scan(|r| r.author() == me && r.path() == target)
            .await?;
        if roots.is_empty() {
            return Ok(());
        }

        let mut doomed = Vec::new();
        if roots.iter().any(|r| !r.decrypted_content.is_file()) {
            let prefix = format!("{}/", target);
            doomed = self
                .inner
                .index
                .scan(|r| r.author() == me && r.path().starts_with(&prefix))
                .await?;
        }
        doomed.extend(roots);
        self.remove_records(doomed, false).await?;
        self.inner.changes.emit(ChangeKind::Deleted, Some(target));
        Ok(())
    }

    /// Move an item (and, for folders, its subtree) to a new path.
    ///
    /// Every version is re-emitted as a new event at the new path and
    /// the previous events are deleted, which keeps the projection
    /// rule uniform instead of introducing a rename tag.
    pub async fn mv(&self, old: &str, new: &str) -> Result<(), DriveError> {
        self.ensure_live()?;
        let old = require_absolute(old)?;
        let new = require_absolute(new)?;
        if old == new || path::is_within(&old, &new) {
            return Err(DriveError::InvalidArgument(
                "cannot move a path into itself".to_string(),
            ));
        }
        let moved = self.rewrite_subtree(&old, &new, true).await?;
        if moved == 0 {
            return Err(DriveError::NotFound(old));
        }
        self.inner.changes.emit(ChangeKind::Deleted, Some(old));
        self.inner.changes.emit(ChangeKind::Added, Some(new));
        Ok(())
    }

    /// Copy an item (and, for folders, its subtree) to a new path. The
    /// ciphertext blobs are shared by hash, not re-uploaded.
    pub async fn cp(&self, src: &str, dst: &str) -> Result<(), DriveError> {
        self.ensure_live()?;
        let src = require_absolute(src)?;
        let dst = require_absolute(dst)?;
        if src == dst || path::is_within(&src, &dst) {
            return Err(DriveError::InvalidArgument(
                "cannot copy a path into itself".to_string(),
            ));
        }
        let copied = self.rewrite_subtree(&src, &dst, false).await?;
        if copied == 0 {
            return Err(DriveError::NotFound(src));
        }
        self.inner.changes.emit(ChangeKind::Added, Some(dst));
        Ok(())
    }

    /// Case-insensitive substring search over names, full paths, and
    /// file MIME types, reduced to current versions and sorted by path.
    pub async fn search(&self, query: &str) -> Result<Vec<DriveItem>, DriveError> {
        self.ensure_live()?;
        let me = self.me();
        let needle = query.to_lowercase();
        let records = self
            .inner
            .index
            .scan(|record| {
                if !record.accessible_to(&me) {
                    return false;
                }
                let full = record.path().to_lowercase();
                if full.contains(&needle) {
                    return true;
                }
                if path::basename(record.path()).to_lowercase().contains(&needle) {
                    return true;
                }
                matches!(
                    &record.decrypted_content,
                    ItemContent::File { file_type: Some(file_type), .. }
                        if file_type.to_lowercase().contains(&needle)
                )
            })
            .await?;
        let mut current = current_versions(records);
        current.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(current.iter().filter_map(|r| r.to_item()).collect())
    }

    // -- internals ---------------------------------------------------

    pub(crate) fn ensure_live(&self) -> Result<(), DriveError> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return Err(DriveError::Terminated);
        }
        Ok(())
    }

    pub(crate) fn me(&self) -> String {
        self.inner.signer.public_key().to_hex()
    }

    /// Seal, sign, upsert, and broadcast one drive event.
    pub(crate) async fn emit_drive_record(
        &self,
        content: ItemContent,
        recipient: Option<&str>,
        original_event_id: Option<&str>,
    ) -> Result<(common::event::Event, DriveRecord), DriveError> {
        let seal_to = match recipient {
            Some(hex) => common::crypto::PublicKey::from_hex(hex).map_err(DriveError::invalid)?,
            None => self.inner.signer.public_key(),
        };
        let plaintext = serde_json::to_vec(&content).map_err(DriveError::crypto)?;
        let sealed = self.inner.signer.seal(&plaintext, &seal_to).await?;

        let mut builder = EventBuilder::drive(sealed);
        if let Some(hex) = recipient {
            builder = builder.recipient(hex);
        }
        let event = self.inner.signer.sign_event(builder).await?;

        let record = DriveRecord {
            nostr_event: event.clone(),
            decrypted_content: content,
            shared_with: recipient.map(|s| s.to_string()),
            original_event_id: original_event_id.map(|s| s.to_string()),
        };
        self.inner.index.put(&record).await?;
        self.inner
            .relay
            .publish(&event)
            .await
            .map_err(DriveError::network)?;
        Ok((event, record))
    }

    /// Remove records locally, release unreferenced blobs, and
    /// broadcast one tombstone covering all of them.
    async fn remove_records(
        &self,
        records: Vec<DriveRecord>,
        emit: bool,
    ) -> Result<(), DriveError> {
        if records.is_empty() {
            return Ok(());
        }
        let me = self.me();
        let mut ids = Vec::with_capacity(records.len());
        for record in &records {
            if let Some(hash) = record.decrypted_content.content_hash() {
                // Copies share the ciphertext blob; only the last
                // reference releases it.
                if self.inner.index.count_hash_refs(hash, record.id()).await? == 0 {
                    if let Err(err) = self.inner.blobs.delete(hash).await {
                        tracing::warn!("blob delete for {} failed: {}", hash, err);
                    }
                }
            }
            self.inner.index.remove(record.id()).await?;
            self.inner.index.add_tombstone(record.id(), &me).await?;
            ids.push(record.id().to_string());
        }

        let event = self
            .inner
            .signer
            .sign_event(EventBuilder::delete(&ids))
            .await?;
        self.inner
            .relay
            .publish(&event)
            .await
            .map_err(DriveError::network)?;

        if emit {
            for record in &records {
                self.inner
                    .changes
                    .emit(ChangeKind::Deleted, Some(record.path().to_string()));
            }
        }
        Ok(())
    }

    /// Re-emit every record of mine at `old` (and under it) with the
    /// prefix rewritten to `new`; optionally delete the originals.
    /// Returns how many records were rewritten.
    async fn rewrite_subtree(
        &self,
        old: &str,
        new: &str,
        delete_previous: bool,
    ) -> Result<usize, DriveError> {
        let me = self.me();
        let prefix = format!("{}/", old);
        let records = self
            .inner
            .index
            .scan(|r| r.author() == me && (r.path() == old || r.path().starts_with(&prefix)))
            .await?;

        for record in &records {
            let new_path = if record.path() == old {
                new.to_string()
            } else {
                format!("{}{}", new, &record.path()[old.len()..])
            };
            let mut content = record.decrypted_content.clone();
            content.set_path(&new_path);
            self.emit_drive_record(
                content,
                record.shared_with.as_deref(),
                record.original_event_id.as_deref(),
            )
            .await?;
        }

        let count = records.len();
        if delete_previous {
            self.remove_records(records, false).await?;
        }
        Ok(count)
    }
}

/// Normalise a caller-supplied path, rejecting relative input before
/// any side effect.
pub(crate) fn require_absolute(raw: &str) -> Result<String, DriveError> {
    if !path::is_absolute(raw) {
        return Err(DriveError::InvalidArgument(format!(
            "path must be absolute: {raw}"
        )));
    }
    Ok(path::normalize(raw))
}

/// Reduce records to the current version per `(type, path)`: greatest
/// `created_at`, ties broken by lexicographically smallest id.
pub(crate) fn current_versions(records: Vec<DriveRecord>) -> Vec<DriveRecord> {
    let mut best: BTreeMap<(&'static str, String), DriveRecord> = BTreeMap::new();
    for record in records {
        let key = (
            record.decrypted_content.type_name(),
            record.path().to_string(),
        );
        match best.get(&key) {
            Some(current) if !wins_over(&record, current) => {}
            _ => {
                best.insert(key, record);
            }
        }
    }
    best.into_values().collect()
}

fn wins_over(a: &DriveRecord, b: &DriveRecord) -> bool {
    a.created_at() > b.created_at()
        || (a.created_at() == b.created_at() && a.id() < b.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::crypto::SecretKey;
    use common::event::EventBuilder as EB;

    fn record(key: &SecretKey, path: &str, created_at: u64, body: &str) -> DriveRecord {
        let event = EB::drive(body.to_string())
            .created_at(created_at)
            .sign(key)
            .unwrap();
        DriveRecord::new(event, ItemContent::folder(path))
    }

    #[test]
    fn require_absolute_normalises() {
        assert_eq!(require_absolute("/a//b/").unwrap(), "/a/b");
        assert!(matches!(
            require_absolute("a/b"),
            Err(DriveError::InvalidArgument(_))
        ));
    }

    #[test]
    fn current_version_picks_newest_then_smallest_id() {
        let key = SecretKey::generate();
        let old = record(&key, "/a", 10, "v1");
        let new = record(&key, "/a", 20, "v2");
        let current = current_versions(vec![old.clone(), new.clone()]);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id(), new.id());

        let tie_a = record(&key, "/b", 30, "tie-a");
        let tie_b = record(&key, "/b", 30, "tie-b");
        let winner = if tie_a.id() < tie_b.id() {
            tie_a.id().to_string()
        } else {
            tie_b.id().to_string()
        };
        let current = current_versions(vec![tie_a, tie_b]);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id(), winner);
    }
}
