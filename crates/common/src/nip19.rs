//! bech32 string forms for event pointers and private keys.
//!
//! An event pointer (`nevent1…`) is a TLV concatenation repacked into
//! 5-bit groups and checksummed as plain bech32. Private keys travel as
//! `nsec1…` (raw 32 bytes) or `ncryptsec1…` (a password-locked envelope,
//! see [`crate::crypto::keywrap`]).

use bech32::{FromBase32, ToBase32, Variant};

/// Human-readable part for event pointers.
pub const EVENT_POINTER_HRP: &str = "nevent";
/// Human-readable part for raw private keys.
pub const SECRET_KEY_HRP: &str = "nsec";
/// Human-readable part for password-locked private keys.
pub const LOCKED_KEY_HRP: &str = "ncryptsec";

const TLV_SPECIAL: u8 = 0;
const TLV_RELAY: u8 = 1;
const TLV_AUTHOR: u8 = 2;
const TLV_KIND: u8 = 3;

#[derive(Debug, thiserror::Error)]
pub enum Nip19Error {
    #[error("bech32 error: {0}")]
    Bech32(#[from] bech32::Error),
    #[error("wrong prefix: expected {expected}, found {found}")]
    WrongPrefix { expected: &'static str, found: String },
    #[error("wrong bech32 variant")]
    WrongVariant,
    #[error("truncated TLV stream")]
    TruncatedTlv,
    #[error("pointer is missing its event id")]
    MissingEventId,
    #[error("TLV value has invalid length {0}")]
    InvalidLength(usize),
}

/// A pointer to an event, optionally carrying hint relays, the author,
/// and the event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPointer {
    /// 32-byte event id.
    pub event_id: [u8; 32],
    /// Relay URL hints, may be empty.
    pub relays: Vec<String>,
    /// 32-byte author public key, if known.
    pub author: Option<[u8; 32]>,
    /// Event kind, if known.
    pub kind: Option<u32>,
}

impl EventPointer {
    pub fn new(event_id: [u8; 32]) -> Self {
        Self {
            event_id,
            relays: Vec::new(),
            author: None,
            kind: None,
        }
    }

    /// Encode the pointer as an `nevent1…` string.
    ///
    /// # Errors
    ///
    /// Fails if a relay hint exceeds the one-byte TLV length.
    pub fn encode(&self) -> Result<String, Nip19Error> {
        let mut tlv = Vec::new();
        push_tlv(&mut tlv, TLV_SPECIAL, &self.event_id)?;
        for relay in &self.relays {
            push_tlv(&mut tlv, TLV_RELAY, relay.as_bytes())?;
        }
        if let Some(author) = &self.author {
            push_tlv(&mut tlv, TLV_AUTHOR, author)?;
        }
        if let Some(kind) = self.kind {
            push_tlv(&mut tlv, TLV_KIND, &kind.to_be_bytes())?;
        }
        Ok(bech32::encode(
            EVENT_POINTER_HRP,
            tlv.to_base32(),
            Variant::Bech32,
        )?)
    }

    /// Decode an `nevent1…` string.
    ///
    /// Unknown TLV types and malformed relay or author values are
    /// skipped; a kind value must be exactly four bytes or it is
    /// discarded. A missing type-0 TLV is an error.
    pub fn decode(encoded: &str) -> Result<Self, Nip19Error> {
        let data = decode_payload(EVENT_POINTER_HRP, encoded)?;

        let mut event_id = None;
        let mut relays = Vec::new();
        let mut author = None;
        let mut kind = None;

        let mut cursor = 0usize;
        while cursor < data.len() {
            if cursor + 2 > data.len() {
                return Err(Nip19Error::TruncatedTlv);
            }
            let tlv_type = data[cursor];
            let len = data[cursor + 1] as usize;
            cursor += 2;
            if cursor + len > data.len() {
                return Err(Nip19Error::TruncatedTlv);
            }
            let value = &data[cursor..cursor + len];
            cursor += len;

            match tlv_type {
                TLV_SPECIAL => {
                    if len != 32 {
                        return Err(Nip19Error::InvalidLength(len));
                    }
                    let mut id = [0u8; 32];
                    id.copy_from_slice(value);
                    event_id = Some(id);
                }
                TLV_RELAY => {
                    if let Ok(url) = std::str::from_utf8(value) {
                        relays.push(url.to_string());
                    }
                }
                TLV_AUTHOR => {
                    if len == 32 {
                        let mut pk = [0u8; 32];
                        pk.copy_from_slice(value);
                        author = Some(pk);
                    }
                }
                TLV_KIND => {
                    if len == 4 {
                        let mut buf = [0u8; 4];
                        buf.copy_from_slice(value);
                        kind = Some(u32::from_be_bytes(buf));
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            event_id: event_id.ok_or(Nip19Error::MissingEventId)?,
            relays,
            author,
            kind,
        })
    }
}

/// Encode a raw 32-byte private key as `nsec1…`.
pub fn encode_secret_key(key: &[u8; 32]) -> Result<String, Nip19Error> {
    Ok(bech32::encode(
        SECRET_KEY_HRP,
        key.to_base32(),
        Variant::Bech32,
    )?)
}

/// Decode an `nsec1…` string back to raw key bytes.
pub fn decode_secret_key(encoded: &str) -> Result<[u8; 32], Nip19Error> {
    let data = decode_payload(SECRET_KEY_HRP, encoded)?;
    if data.len() != 32 {
        return Err(Nip19Error::InvalidLength(data.len()));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&data);
    Ok(key)
}

/// Encode an opaque locked-key envelope as `ncryptsec1…`.
pub fn encode_locked_key(payload: &[u8]) -> Result<String, Nip19Error> {
    Ok(bech32::encode(
        LOCKED_KEY_HRP,
        payload.to_base32(),
        Variant::Bech32,
    )?)
}

/// Decode an `ncryptsec1…` string to the locked-key envelope bytes.
pub fn decode_locked_key(encoded: &str) -> Result<Vec<u8>, Nip19Error> {
    decode_payload(LOCKED_KEY_HRP, encoded)
}

fn push_tlv(out: &mut Vec<u8>, tlv_type: u8, value: &[u8]) -> Result<(), Nip19Error> {
    if value.len() > u8::MAX as usize {
        return Err(Nip19Error::InvalidLength(value.len()));
    }
    out.push(tlv_type);
    out.push(value.len() as u8);
    out.extend_from_slice(value);
    Ok(())
}

fn decode_payload(expected_hrp: &'static str, encoded: &str) -> Result<Vec<u8>, Nip19Error> {
    let (hrp, data, variant) = bech32::decode(encoded)?;
    if hrp != expected_hrp {
        return Err(Nip19Error::WrongPrefix {
            expected: expected_hrp,
            found: hrp,
        });
    }
    if variant != Variant::Bech32 {
        return Err(Nip19Error::WrongVariant);
    }
    Ok(Vec::<u8>::from_base32(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer() -> EventPointer {
        EventPointer {
            event_id: [7u8; 32],
            relays: vec!["wss://relay.example.org".to_string()],
            author: Some([9u8; 32]),
            kind: Some(9500),
        }
    }

    #[test]
    fn pointer_roundtrip() {
        let p = pointer();
        let encoded = p.encode().unwrap();
        assert!(encoded.starts_with("nevent1"));
        assert_eq!(EventPointer::decode(&encoded).unwrap(), p);
    }

    #[test]
    fn pointer_roundtrip_minimal() {
        let p = EventPointer::new([1u8; 32]);
        let encoded = p.encode().unwrap();
        assert_eq!(EventPointer::decode(&encoded).unwrap(), p);
    }

    #[test]
    fn pointer_rejects_wrong_prefix() {
        let nsec = encode_secret_key(&[3u8; 32]).unwrap();
        assert!(matches!(
            EventPointer::decode(&nsec),
            Err(Nip19Error::WrongPrefix { .. })
        ));
    }

    #[test]
    fn pointer_requires_event_id() {
        // A lone relay TLV, no type-0 entry.
        let mut tlv = Vec::new();
        push_tlv(&mut tlv, TLV_RELAY, b"wss://r.example").unwrap();
        let encoded =
            bech32::encode(EVENT_POINTER_HRP, tlv.to_base32(), Variant::Bech32).unwrap();
        assert!(matches!(
            EventPointer::decode(&encoded),
            Err(Nip19Error::MissingEventId)
        ));
    }

    #[test]
    fn pointer_ignores_unknown_tlv_and_bad_kind() {
        let mut tlv = Vec::new();
        push_tlv(&mut tlv, TLV_SPECIAL, &[5u8; 32]).unwrap();
        push_tlv(&mut tlv, 200, b"mystery").unwrap();
        // Three-byte kind values are discarded.
        push_tlv(&mut tlv, TLV_KIND, &[0, 1, 2]).unwrap();
        let encoded =
            bech32::encode(EVENT_POINTER_HRP, tlv.to_base32(), Variant::Bech32).unwrap();
        let decoded = EventPointer::decode(&encoded).unwrap();
        assert_eq!(decoded.event_id, [5u8; 32]);
        assert_eq!(decoded.kind, None);
    }

    #[test]
    fn secret_key_roundtrip() {
        let key = [0xabu8; 32];
        let encoded = encode_secret_key(&key).unwrap();
        assert!(encoded.starts_with("nsec1"));
        assert_eq!(decode_secret_key(&encoded).unwrap(), key);
    }

    #[test]
    fn truncated_tlv_is_rejected() {
        let tlv = vec![TLV_SPECIAL, 32, 1, 2, 3];
        let encoded =
            bech32::encode(EVENT_POINTER_HRP, tlv.to_base32(), Variant::Bech32).unwrap();
        assert!(matches!(
            EventPointer::decode(&encoded),
            Err(Nip19Error::TruncatedTlv)
        ));
    }
}
