//! Authenticated public-key seal for metadata at rest.
//!
//! A sealed payload can be opened by either side of a key pair: the
//! sender with the recipient's public key, or the recipient with the
//! sender's public key. Sealing derives the ECDH conversation key
//! (see [`super::keys::SecretKey::conversation_key`]) and encrypts
//! with ChaCha20-Poly1305 under a fresh nonce.
//!
//! Wire form: `base64( version (1) || nonce (12) || ciphertext || tag (16) )`.
//! Callers treat the payload as opaque.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use super::keys::{PublicKey, SecretKey};

const VERSION: u8 = 2;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// Errors that can occur when sealing or opening payloads.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload too short")]
    TooShort,
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),
    #[error("seal error")]
    SealFailure,
    #[error("failed to open sealed payload")]
    OpenFailure,
}

/// Seal a plaintext from `local` to `remote`.
pub fn seal(
    plaintext: &[u8],
    local: &SecretKey,
    remote: &PublicKey,
) -> Result<String, EnvelopeError> {
    let key = local.conversation_key(remote);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce_bytes).expect("failed to generate random bytes");
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| EnvelopeError::SealFailure)?;

    let mut out = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
    out.push(VERSION);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(out))
}

/// Open a sealed payload shared between `local` and `remote`.
pub fn open(
    payload: &str,
    local: &SecretKey,
    remote: &PublicKey,
) -> Result<Vec<u8>, EnvelopeError> {
    let data = BASE64.decode(payload)?;
    if data.len() < 1 + NONCE_SIZE + TAG_SIZE {
        return Err(EnvelopeError::TooShort);
    }
    if data[0] != VERSION {
        return Err(EnvelopeError::UnsupportedVersion(data[0]));
    }

    let key = local.conversation_key(remote);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let nonce = Nonce::from_slice(&data[1..1 + NONCE_SIZE]);
    cipher
        .decrypt(nonce, &data[1 + NONCE_SIZE..])
        .map_err(|_| EnvelopeError::OpenFailure)
}
