//! The signed event model.
//!
//! Two kinds exist: `DRIVE` (9500) carries a sealed metadata body and
//! `DELETE` (5) tombstones earlier events by id. An event's identity is
//! the SHA-256 of the canonical serialisation
//! `[0, pubkey, created_at, kind, tags, content]`, signed with Schnorr.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::{KeyError, PublicKey, SecretKey};

/// Kind of drive metadata events.
pub const DRIVE_KIND: u32 = 9500;
/// Kind of deletion tombstones.
pub const DELETE_KIND: u32 = 5;

/// Simple tag wrapper preserving tag fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag(pub Vec<String>);

impl Tag {
    pub fn new(name: &str, value: &str) -> Self {
        Tag(vec![name.to_string(), value.to_string()])
    }

    /// The tag's value field, if it names `name` and carries one.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        match self.0.as_slice() {
            [tag, value, ..] if tag == name => Some(value),
            _ => None,
        }
    }
}

/// Errors that can occur building or validating events.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("event id does not match its contents")]
    IdMismatch,
    #[error("malformed event field: {0}")]
    Malformed(&'static str),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

/// A signed, immutable event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event identifier (hex of SHA-256 hash).
    pub id: String,
    /// Author public key (hex, x-only).
    pub pubkey: String,
    /// Unix timestamp of creation, in seconds.
    pub created_at: u64,
    /// Kind number.
    pub kind: u32,
    /// Arbitrary tags.
    pub tags: Vec<Tag>,
    /// Content body; a sealed payload for drive events, empty for deletes.
    pub content: String,
    /// Schnorr signature over the event hash (hex).
    pub sig: String,
}

impl Event {
    /// Verify the event's id recomputation and Schnorr signature.
    pub fn verify(&self) -> Result<(), EventError> {
        let hash = event_hash(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )?;
        if hex::encode(hash) != self.id {
            return Err(EventError::IdMismatch);
        }
        let pubkey = PublicKey::from_hex(&self.pubkey)?;
        let sig = hex::decode(&self.sig).map_err(|_| EventError::Malformed("sig"))?;
        pubkey.verify(&hash, &sig)?;
        Ok(())
    }

    /// Values of every `p` tag.
    pub fn p_tags(&self) -> Vec<&str> {
        self.tags.iter().filter_map(|t| t.value_of("p")).collect()
    }

    /// Values of every `e` tag.
    pub fn e_tags(&self) -> Vec<&str> {
        self.tags.iter().filter_map(|t| t.value_of("e")).collect()
    }

    /// Whether a `p` tag addresses the given public key.
    pub fn is_addressed_to(&self, pubkey_hex: &str) -> bool {
        self.tags
            .iter()
            .any(|t| t.value_of("p") == Some(pubkey_hex))
    }
}

/// Recompute the canonical event hash from its fields.
pub fn event_hash(
    pubkey: &str,
    created_at: u64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> Result<[u8; 32], EventError> {
    let arr = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    let data = serde_json::to_vec(&arr)?;
    let hash = Sha256::digest(&data);
    Ok(hash.into())
}

/// Current unix time in seconds, bumped so that successive local events
/// never tie on `created_at`.
pub fn unix_now() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut last = LAST.load(Ordering::Relaxed);
    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Builder for the two event kinds.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    kind: u32,
    tags: Vec<Tag>,
    content: String,
    created_at: u64,
}

impl EventBuilder {
    /// A drive event carrying a sealed metadata body.
    pub fn drive(sealed_content: String) -> Self {
        Self {
            kind: DRIVE_KIND,
            tags: Vec::new(),
            content: sealed_content,
            created_at: unix_now(),
        }
    }

    /// A deletion tombstone with one `e` tag per targeted event.
    pub fn delete(event_ids: &[String]) -> Self {
        Self {
            kind: DELETE_KIND,
            tags: event_ids.iter().map(|id| Tag::new("e", id)).collect(),
            content: String::new(),
            created_at: unix_now(),
        }
    }

    /// Address the event to a recipient with a `p` tag.
    pub fn recipient(mut self, pubkey_hex: &str) -> Self {
        self.tags.push(Tag::new("p", pubkey_hex));
        self
    }

    /// Override the creation timestamp.
    pub fn created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Compute the id and sign with the given key.
    pub fn sign(self, key: &SecretKey) -> Result<Event, EventError> {
        let pubkey = key.public().to_hex();
        let hash = event_hash(&pubkey, self.created_at, self.kind, &self.tags, &self.content)?;
        let sig = key.sign(&hash)?;
        Ok(Event {
            id: hex::encode(hash),
            pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig: hex::encode(sig),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let key = SecretKey::generate();
        let event = EventBuilder::drive("payload".to_string())
            .sign(&key)
            .unwrap();
        assert_eq!(event.kind, DRIVE_KIND);
        event.verify().unwrap();
    }

    #[test]
    fn verify_rejects_tampered_id() {
        let key = SecretKey::generate();
        let mut event = EventBuilder::drive("payload".to_string())
            .sign(&key)
            .unwrap();
        event.id.replace_range(0..2, "ff");
        assert!(matches!(event.verify(), Err(EventError::IdMismatch)));
    }

    #[test]
    fn verify_rejects_tampered_content() {
        let key = SecretKey::generate();
        let mut event = EventBuilder::drive("payload".to_string())
            .sign(&key)
            .unwrap();
        event.content = "other".to_string();
        assert!(event.verify().is_err());
    }

    #[test]
    fn delete_builder_tags_targets() {
        let key = SecretKey::generate();
        let event = EventBuilder::delete(&["aa".to_string(), "bb".to_string()])
            .sign(&key)
            .unwrap();
        assert_eq!(event.kind, DELETE_KIND);
        assert_eq!(event.e_tags(), vec!["aa", "bb"]);
        assert!(event.content.is_empty());
        event.verify().unwrap();
    }

    #[test]
    fn recipient_tagging() {
        let key = SecretKey::generate();
        let event = EventBuilder::drive("payload".to_string())
            .recipient("cafe")
            .sign(&key)
            .unwrap();
        assert!(event.is_addressed_to("cafe"));
        assert!(!event.is_addressed_to("beef"));
        assert_eq!(event.p_tags(), vec!["cafe"]);
    }

    #[test]
    fn unix_now_is_strictly_increasing() {
        let a = unix_now();
        let b = unix_now();
        let c = unix_now();
        assert!(a < b && b < c);
    }

    #[test]
    fn event_hash_matches_reference() {
        let tags = vec![Tag::new("p", "aa")];
        let expected = {
            let arr = serde_json::json!([0, "00", 1, DRIVE_KIND, tags, "body"]);
            let digest = Sha256::digest(serde_json::to_vec(&arr).unwrap());
            let mut out = [0u8; 32];
            out.copy_from_slice(&digest);
            out
        };
        assert_eq!(
            event_hash("00", 1, DRIVE_KIND, &tags, "body").unwrap(),
            expected
        );
    }

    #[test]
    fn wire_roundtrip() {
        let key = SecretKey::generate();
        let event = EventBuilder::drive("payload".to_string())
            .recipient("cafe")
            .sign(&key)
            .unwrap();
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
        parsed.verify().unwrap();
    }
}
