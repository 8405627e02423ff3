//! Sharing: share events, share links, and shared-file access.
//!
//! A share is an ordinary drive event re-sealed to the recipient, with
//! the sender staying the author. Share links mint a fresh keypair per
//! link; the link carries an event pointer plus the (optionally
//! password-locked) private key.
//!
//! Revoking a link is a local deletion plus a broadcast tombstone.
//! Relays are not obliged to honour the tombstone, so revocation is
//! best-effort, not cryptographic.

use common::crypto::{envelope, keywrap, PublicKey, SecretKey};
use common::event::{Event, DRIVE_KIND};
use common::item::{DriveItem, FileMetadata, ItemContent};
use common::nip19::{self, EventPointer};

use crate::blobs::BlobClient;
use crate::changes::ChangeKind;
use crate::error::DriveError;
use crate::relay::{Filter, RelayClient};
use crate::signer::Signer;

use super::Drive;

/// The parsed surface of a share link.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedFileAccess {
    /// Hex id of the share event.
    pub event_id: String,
    /// Relay hints from the pointer.
    pub relays: Vec<String>,
    /// Hex author public key, if the pointer carries one.
    pub author: Option<String>,
    /// Event kind, if the pointer carries one.
    pub kind: Option<u32>,
    /// The raw key segment, `nsec1…` or `ncryptsec1…`.
    pub encoded_private_key: String,
    pub is_password_protected: bool,
    /// The raw pointer segment.
    pub nevent: String,
}

impl<S, R, B> Drive<S, R, B>
where
    S: Signer,
    R: RelayClient,
    B: BlobClient,
{
    /// Re-seal an event's metadata to `recipient` and emit it as a new
    /// drive event addressed with a `p` tag. The returned event is the
    /// share itself.
    pub async fn share_with_user(
        &self,
        event_id: &str,
        recipient: &str,
    ) -> Result<Event, DriveError> {
        self.ensure_live()?;
        PublicKey::from_hex(recipient).map_err(DriveError::invalid)?;
        let record = self
            .inner
            .index
            .get(event_id)
            .await?
            .ok_or_else(|| DriveError::NotFound(event_id.to_string()))?;
        if record.author() != self.me() {
            return Err(DriveError::Unauthorized(
                "cannot share an event authored by someone else".to_string(),
            ));
        }

        let (event, _) = self
            .emit_drive_record(
                record.decrypted_content.clone(),
                Some(recipient),
                Some(event_id),
            )
            .await?;
        self.inner
            .changes
            .emit(ChangeKind::Shared, Some(record.path().to_string()));
        Ok(event)
    }

    /// Mint a share link: a fresh keypair, a share event to its public
    /// key, and `<base_url>/<nevent>/<key>` where the key segment is
    /// `nsec1…` or, with a password, `ncryptsec1…`.
    pub async fn generate_share_link(
        &self,
        event_id: &str,
        password: Option<&str>,
        base_url: &str,
        relays: &[String],
    ) -> Result<String, DriveError> {
        self.ensure_live()?;
        let share_key = SecretKey::generate();
        let share_event = self
            .share_with_user(event_id, &share_key.public().to_hex())
            .await?;

        let mut id = [0u8; 32];
        hex::decode_to_slice(&share_event.id, &mut id).map_err(DriveError::invalid)?;
        let pointer = EventPointer {
            event_id: id,
            relays: relays.to_vec(),
            author: Some(self.inner.signer.public_key().to_bytes()),
            kind: Some(DRIVE_KIND),
        };
        let nevent = pointer.encode()?;

        let encoded_key = match password {
            Some(password) if !password.is_empty() => {
                keywrap::lock_key(&share_key.to_bytes(), password)
                    .map_err(DriveError::crypto)?
            }
            _ => nip19::encode_secret_key(&share_key.to_bytes())?,
        };

        Ok(format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            nevent,
            encoded_key
        ))
    }

    /// Revoke a share link's event: delete locally and broadcast a
    /// tombstone. Relays may refuse to honour it; only the local view
    /// is guaranteed to forget.
    pub async fn revoke_share(&self, event_id: &str) -> Result<(), DriveError> {
        self.delete_by_id(event_id).await
    }

    /// Open a shared file from a pointer and its share private key.
    ///
    /// A scratch relay client scoped to the pointer's hint relays (or
    /// the configured defaults) fetches the event; nothing touches the
    /// main index, and the scratch client is torn down on every exit
    /// path.
    pub async fn access_shared_file(
        &self,
        nevent: &str,
        share_key_hex: &str,
    ) -> Result<FileMetadata, DriveError> {
        self.ensure_live()?;
        let pointer = EventPointer::decode(nevent)?;
        let share_key = SecretKey::from_hex(share_key_hex).map_err(DriveError::invalid)?;

        let relays = if pointer.relays.is_empty() {
            self.inner.config.default_relays.clone()
        } else {
            pointer.relays.clone()
        };
        let scratch = self
            .inner
            .relay
            .open_scoped(&relays)
            .await
            .map_err(DriveError::network)?;
        let result = fetch_shared(&scratch, &pointer, &share_key).await;
        scratch.close().await;
        result
    }
}

async fn fetch_shared<R: RelayClient>(
    scratch: &R,
    pointer: &EventPointer,
    share_key: &SecretKey,
) -> Result<FileMetadata, DriveError> {
    let id_hex = hex::encode(pointer.event_id);
    let events = scratch
        .query(vec![Filter::new().ids([id_hex.clone()])])
        .await
        .map_err(DriveError::network)?;
    let event = events
        .into_iter()
        .find(|e| e.id == id_hex)
        .ok_or(DriveError::NotFound(id_hex))?;

    if !event.is_addressed_to(&share_key.public().to_hex()) {
        return Err(DriveError::Unauthorized(
            "share recipient mismatch".to_string(),
        ));
    }

    let author = PublicKey::from_hex(&event.pubkey).map_err(DriveError::invalid)?;
    let plaintext =
        envelope::open(&event.content, share_key, &author).map_err(DriveError::crypto)?;
    let content: ItemContent =
        serde_json::from_slice(&plaintext).map_err(DriveError::crypto)?;
    match DriveItem::from_content(&event.id, event.created_at, &content)? {
        DriveItem::File(file) => Ok(file),
        DriveItem::Folder(_) => Err(DriveError::InvalidArgument(
            "shared event is not a file".to_string(),
        )),
    }
}

/// Split a share link into its pointer and key segments. The last two
/// path segments are `<nevent>` and `<encoded-key>`.
pub fn parse_share_link(link: &str) -> Result<SharedFileAccess, DriveError> {
    let mut segments = link.split('/').rev().filter(|s| !s.is_empty());
    let encoded_key = segments
        .next()
        .ok_or_else(|| DriveError::InvalidArgument("malformed share link".to_string()))?;
    let nevent = segments
        .next()
        .ok_or_else(|| DriveError::InvalidArgument("malformed share link".to_string()))?;

    let pointer = EventPointer::decode(nevent)?;
    if !encoded_key.starts_with(&format!("{}1", nip19::SECRET_KEY_HRP))
        && !encoded_key.starts_with(&format!("{}1", nip19::LOCKED_KEY_HRP))
    {
        return Err(DriveError::InvalidArgument(
            "share link carries no key segment".to_string(),
        ));
    }

    Ok(SharedFileAccess {
        event_id: hex::encode(pointer.event_id),
        relays: pointer.relays,
        author: pointer.author.map(hex::encode),
        kind: pointer.kind,
        encoded_private_key: encoded_key.to_string(),
        is_password_protected: encoded_key.starts_with(&format!("{}1", nip19::LOCKED_KEY_HRP)),
        nevent: nevent.to_string(),
    })
}

/// Decode a share link's key segment to a hex private key. Locked keys
/// require the password they were locked with.
pub fn decode_share_key(encoded: &str, password: Option<&str>) -> Result<String, DriveError> {
    if encoded.starts_with(&format!("{}1", nip19::LOCKED_KEY_HRP)) {
        let password = password.ok_or_else(|| {
            DriveError::InvalidArgument("this share link requires a password".to_string())
        })?;
        let key = keywrap::unlock_key(encoded, password).map_err(DriveError::crypto)?;
        Ok(hex::encode(key))
    } else {
        let key = nip19::decode_secret_key(encoded)?;
        Ok(hex::encode(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_key_roundtrip_plain() {
        let key = SecretKey::generate();
        let encoded = nip19::encode_secret_key(&key.to_bytes()).unwrap();
        assert_eq!(decode_share_key(&encoded, None).unwrap(), key.to_hex());
    }

    #[test]
    fn share_key_roundtrip_locked() {
        let key = SecretKey::generate();
        let encoded = keywrap::lock_key(&key.to_bytes(), "hunter2").unwrap();
        assert!(matches!(
            decode_share_key(&encoded, None),
            Err(DriveError::InvalidArgument(_))
        ));
        assert!(matches!(
            decode_share_key(&encoded, Some("wrong")),
            Err(DriveError::Crypto(_))
        ));
        assert_eq!(
            decode_share_key(&encoded, Some("hunter2")).unwrap(),
            key.to_hex()
        );
    }

    #[test]
    fn parse_link_segments() {
        let pointer = EventPointer {
            event_id: [3u8; 32],
            relays: vec!["wss://r.example".to_string()],
            author: Some([4u8; 32]),
            kind: Some(DRIVE_KIND),
        };
        let nevent = pointer.encode().unwrap();
        let nsec = nip19::encode_secret_key(&[5u8; 32]).unwrap();
        let link = format!("https://drive.example.org/share/{}/{}", nevent, nsec);

        let access = parse_share_link(&link).unwrap();
        assert_eq!(access.event_id, hex::encode([3u8; 32]));
        assert_eq!(access.relays, vec!["wss://r.example".to_string()]);
        assert_eq!(access.author, Some(hex::encode([4u8; 32])));
        assert_eq!(access.kind, Some(DRIVE_KIND));
        assert_eq!(access.nevent, nevent);
        assert!(!access.is_password_protected);
    }

    #[test]
    fn parse_link_detects_password_protection() {
        let nevent = EventPointer::new([1u8; 32]).encode().unwrap();
        let locked = keywrap::lock_key(&[2u8; 32], "pw").unwrap();
        let link = format!("https://x.example/{}/{}", nevent, locked);
        let access = parse_share_link(&link).unwrap();
        assert!(access.is_password_protected);
    }

    #[test]
    fn parse_link_rejects_garbage() {
        assert!(parse_share_link("https://x.example/not-a-pointer").is_err());
        let nevent = EventPointer::new([1u8; 32]).encode().unwrap();
        // Key segment missing entirely.
        let link = format!("https://x.example/{}", nevent);
        assert!(parse_share_link(&link).is_err());
    }
}
