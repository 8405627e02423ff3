//! Content encryption using AES-256-GCM.
//!
//! Every encrypted file gets its own random key and nonce. The
//! encrypted form is `ciphertext || tag` with the 16-byte tag last;
//! the key and nonce never touch the blob network and travel only
//! inside sealed metadata.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Size of an AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of an AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;
/// The only content encryption algorithm metadata may name.
pub const CONTENT_ALGORITHM: &str = "aes-gcm";

/// Errors that can occur during content encryption/decryption.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("invalid key length: expected {KEY_SIZE} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("invalid nonce length: expected {NONCE_SIZE} bytes, got {0}")]
    InvalidNonceLength(usize),
    #[error("unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("ciphertext too short to carry an authentication tag")]
    TooShort,
    #[error("authentication tag mismatch")]
    TagMismatch,
    #[error("encrypt error")]
    EncryptFailure,
}

/// A per-file AES-256-GCM key and nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSecret {
    key: [u8; KEY_SIZE],
    nonce: [u8; NONCE_SIZE],
}

impl ContentSecret {
    /// Generate a fresh random key and nonce.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut key).expect("failed to generate random bytes");
        getrandom::getrandom(&mut nonce).expect("failed to generate random bytes");
        Self { key, nonce }
    }

    /// Rebuild a secret from the base64 forms carried in metadata.
    ///
    /// # Errors
    ///
    /// Rejects keys that do not decode to exactly 32 bytes and nonces
    /// that do not decode to exactly 12 bytes. This is the validation
    /// boundary for key material arriving from untrusted sources.
    pub fn from_base64(key: &str, nonce: &str) -> Result<Self, SecretError> {
        let key_bytes = BASE64.decode(key)?;
        let nonce_bytes = BASE64.decode(nonce)?;
        Self::from_bytes(&key_bytes, &nonce_bytes)
    }

    /// Rebuild a secret from raw bytes, enforcing exact sizes.
    pub fn from_bytes(key: &[u8], nonce: &[u8]) -> Result<Self, SecretError> {
        if key.len() != KEY_SIZE {
            return Err(SecretError::InvalidKeyLength(key.len()));
        }
        if nonce.len() != NONCE_SIZE {
            return Err(SecretError::InvalidNonceLength(nonce.len()));
        }
        let mut k = [0u8; KEY_SIZE];
        let mut n = [0u8; NONCE_SIZE];
        k.copy_from_slice(key);
        n.copy_from_slice(nonce);
        Ok(Self { key: k, nonce: n })
    }

    pub fn key_base64(&self) -> String {
        BASE64.encode(self.key)
    }

    pub fn nonce_base64(&self) -> String {
        BASE64.encode(self.nonce)
    }

    /// Encrypt plaintext, producing `ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecretError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        cipher
            .encrypt(Nonce::from_slice(&self.nonce), plaintext)
            .map_err(|_| SecretError::EncryptFailure)
    }

    /// Decrypt `ciphertext || tag`, verifying the tag.
    ///
    /// # Errors
    ///
    /// A failed tag check returns [`SecretError::TagMismatch`] and no
    /// plaintext.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, SecretError> {
        if blob.len() < TAG_SIZE {
            return Err(SecretError::TooShort);
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        cipher
            .decrypt(Nonce::from_slice(&self.nonce), blob)
            .map_err(|_| SecretError::TagMismatch)
    }
}

/// Encrypt plaintext under a fresh random key and nonce.
pub fn encrypt(plaintext: &[u8]) -> Result<(Vec<u8>, ContentSecret), SecretError> {
    let secret = ContentSecret::generate();
    let ciphertext = secret.encrypt(plaintext)?;
    Ok((ciphertext, secret))
}

/// Check a metadata-declared algorithm name at the trust boundary.
pub fn ensure_algorithm(algorithm: &str) -> Result<(), SecretError> {
    if algorithm != CONTENT_ALGORITHM {
        return Err(SecretError::UnsupportedAlgorithm(algorithm.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let data = b"hello world, this is a test message for encryption";
        let (ciphertext, secret) = encrypt(data).unwrap();
        assert_eq!(ciphertext.len(), data.len() + TAG_SIZE);
        let decrypted = secret.decrypt(&ciphertext).unwrap();
        assert_eq!(decrypted.as_slice(), data.as_slice());
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let (ciphertext, secret) = encrypt(b"").unwrap();
        assert_eq!(ciphertext.len(), TAG_SIZE);
        assert_eq!(secret.decrypt(&ciphertext).unwrap(), b"");
    }

    #[test]
    fn mutated_ciphertext_fails_tag_check() {
        let (mut ciphertext, secret) = encrypt(b"some content").unwrap();
        ciphertext[3] ^= 0xff;
        assert!(matches!(
            secret.decrypt(&ciphertext),
            Err(SecretError::TagMismatch)
        ));
    }

    #[test]
    fn wrong_key_fails_tag_check() {
        let (ciphertext, secret) = encrypt(b"some content").unwrap();
        let other = ContentSecret::from_bytes(&[1u8; KEY_SIZE], &[2u8; NONCE_SIZE]).unwrap();
        assert_ne!(other, secret);
        assert!(matches!(
            other.decrypt(&ciphertext),
            Err(SecretError::TagMismatch)
        ));
    }

    #[test]
    fn base64_roundtrip() {
        let secret = ContentSecret::generate();
        let recovered =
            ContentSecret::from_base64(&secret.key_base64(), &secret.nonce_base64()).unwrap();
        assert_eq!(secret, recovered);
    }

    #[test]
    fn size_validation() {
        assert!(matches!(
            ContentSecret::from_bytes(&[0u8; 16], &[0u8; NONCE_SIZE]),
            Err(SecretError::InvalidKeyLength(16))
        ));
        assert!(matches!(
            ContentSecret::from_bytes(&[0u8; KEY_SIZE], &[0u8; 8]),
            Err(SecretError::InvalidNonceLength(8))
        ));
        let short_key = BASE64.encode([0u8; 31]);
        let good_nonce = BASE64.encode([0u8; NONCE_SIZE]);
        assert!(ContentSecret::from_base64(&short_key, &good_nonce).is_err());
    }

    #[test]
    fn algorithm_check() {
        assert!(ensure_algorithm("aes-gcm").is_ok());
        assert!(matches!(
            ensure_algorithm("chacha20"),
            Err(SecretError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn short_blob_is_rejected() {
        let secret = ContentSecret::generate();
        assert!(matches!(
            secret.decrypt(&[0u8; 8]),
            Err(SecretError::TooShort)
        ));
    }
}
