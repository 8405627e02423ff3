//! Password-locked private-key envelopes (`ncryptsec`).
//!
//! A share link may carry its ephemeral private key wrapped under a
//! password. The wrap derives a 32-byte key with scrypt and encrypts
//! the private key with ChaCha20-Poly1305.
//!
//! Envelope layout, bech32-wrapped under the `ncryptsec` prefix:
//! `version (1) || log_n (1) || salt (16) || nonce (12) || ciphertext+tag (48)`.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use scrypt::Params;

use crate::nip19::{self, Nip19Error};

const VERSION: u8 = 2;
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
// scrypt cost as log2(N); r = 8, p = 1.
const LOG_N: u8 = 15;

/// Errors that can occur locking or unlocking a key envelope.
#[derive(Debug, thiserror::Error)]
pub enum KeywrapError {
    #[error("nip19 error: {0}")]
    Nip19(#[from] Nip19Error),
    #[error("invalid scrypt parameters")]
    BadParams,
    #[error("envelope too short")]
    TooShort,
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),
    #[error("wrong password or corrupted envelope")]
    WrongPassword,
    #[error("seal error")]
    SealFailure,
}

/// Lock a 32-byte private key under a password, returning `ncryptsec1…`.
pub fn lock_key(secret: &[u8; 32], password: &str) -> Result<String, KeywrapError> {
    let mut salt = [0u8; SALT_SIZE];
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut salt).expect("failed to generate random bytes");
    getrandom::getrandom(&mut nonce_bytes).expect("failed to generate random bytes");

    let key = derive_key(password, &salt, LOG_N)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), secret.as_slice())
        .map_err(|_| KeywrapError::SealFailure)?;

    let mut payload = Vec::with_capacity(2 + SALT_SIZE + NONCE_SIZE + ciphertext.len());
    payload.push(VERSION);
    payload.push(LOG_N);
    payload.extend_from_slice(&salt);
    payload.extend_from_slice(&nonce_bytes);
    payload.extend_from_slice(&ciphertext);
    Ok(nip19::encode_locked_key(&payload)?)
}

/// Unlock an `ncryptsec1…` envelope with a password.
///
/// # Errors
///
/// A wrong password fails the authentication tag and returns
/// [`KeywrapError::WrongPassword`].
pub fn unlock_key(encoded: &str, password: &str) -> Result<[u8; 32], KeywrapError> {
    let payload = nip19::decode_locked_key(encoded)?;
    if payload.len() < 2 + SALT_SIZE + NONCE_SIZE + TAG_SIZE {
        return Err(KeywrapError::TooShort);
    }
    if payload[0] != VERSION {
        return Err(KeywrapError::UnsupportedVersion(payload[0]));
    }
    let log_n = payload[1];
    let salt = &payload[2..2 + SALT_SIZE];
    let nonce = &payload[2 + SALT_SIZE..2 + SALT_SIZE + NONCE_SIZE];
    let ciphertext = &payload[2 + SALT_SIZE + NONCE_SIZE..];

    let key = derive_key(password, salt, log_n)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| KeywrapError::WrongPassword)?;
    if plaintext.len() != 32 {
        return Err(KeywrapError::TooShort);
    }

    let mut secret = [0u8; 32];
    secret.copy_from_slice(&plaintext);
    Ok(secret)
}

fn derive_key(password: &str, salt: &[u8], log_n: u8) -> Result<[u8; 32], KeywrapError> {
    let params = Params::new(log_n, 8, 1, 32).map_err(|_| KeywrapError::BadParams)?;
    let mut key = [0u8; 32];
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut key)
        .map_err(|_| KeywrapError::BadParams)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_unlock_roundtrip() {
        let secret = [77u8; 32];
        let encoded = lock_key(&secret, "correct horse").unwrap();
        assert!(encoded.starts_with("ncryptsec1"));
        assert_eq!(unlock_key(&encoded, "correct horse").unwrap(), secret);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let encoded = lock_key(&[1u8; 32], "right").unwrap();
        assert!(matches!(
            unlock_key(&encoded, "wrong"),
            Err(KeywrapError::WrongPassword)
        ));
    }

    #[test]
    fn envelopes_are_salted() {
        let secret = [9u8; 32];
        let a = lock_key(&secret, "pw").unwrap();
        let b = lock_key(&secret, "pw").unwrap();
        assert_ne!(a, b);
    }
}
