//! secp256k1 keypairs for identity, signing, and key agreement.
//!
//! Public keys are the 32-byte x-only form used throughout the event
//! model; secret keys can sign event hashes with Schnorr and derive a
//! symmetric conversation key with any public key via ECDH. The
//! conversation key is the SHA-256 of the shared point's x coordinate,
//! so `conversation_key(a, B) == conversation_key(b, A)`.

use secp256k1::schnorr::Signature;
use secp256k1::{ecdh, Keypair, Message, Parity, Secp256k1, XOnlyPublicKey};
use sha2::{Digest, Sha256};

/// Size of a secret key in bytes.
pub const SECRET_KEY_SIZE: usize = 32;
/// Size of an x-only public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Errors that can occur during key operations.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("signature verification failed")]
    BadSignature,
}

/// Public half of a keypair: identifies an author and addresses shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(XOnlyPublicKey);

impl PublicKey {
    /// Parse a public key from a hexadecimal string.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let bytes =
            hex::decode(hex).map_err(|_| anyhow::anyhow!("public key hex decode error"))?;
        Self::try_from(bytes.as_slice())
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.serialize()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verify a Schnorr signature over a 32-byte digest.
    pub fn verify(&self, digest: &[u8; 32], sig: &[u8]) -> Result<(), KeyError> {
        let secp = Secp256k1::verification_only();
        let sig = Signature::from_slice(sig)
            .map_err(|_| anyhow::anyhow!("malformed signature"))?;
        let msg = Message::from_digest_slice(digest)
            .map_err(|_| anyhow::anyhow!("malformed digest"))?;
        secp.verify_schnorr(&sig, &msg, &self.0)
            .map_err(|_| KeyError::BadSignature)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid public key size, expected {}, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )
            .into());
        }
        let key = XOnlyPublicKey::from_slice(bytes)
            .map_err(|_| anyhow::anyhow!("invalid public key bytes"))?;
        Ok(PublicKey(key))
    }
}

/// Secret half of a keypair.
#[derive(Clone)]
pub struct SecretKey(Keypair);

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        write!(f, "SecretKey({})", self.public().to_hex())
    }
}

impl SecretKey {
    /// Generate a new random secret key from the system RNG.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        loop {
            let mut buff = [0u8; SECRET_KEY_SIZE];
            getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
            if let Ok(keypair) = Keypair::from_seckey_slice(&secp, &buff) {
                return SecretKey(keypair);
            }
        }
    }

    /// Build a secret key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid curve scalar.
    pub fn from_bytes(bytes: &[u8; SECRET_KEY_SIZE]) -> Result<Self, KeyError> {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, bytes)
            .map_err(|_| anyhow::anyhow!("invalid secret key bytes"))?;
        Ok(SecretKey(keypair))
    }

    /// Parse a secret key from a hexadecimal string.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let mut buff = [0u8; SECRET_KEY_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| anyhow::anyhow!("secret key hex decode error"))?;
        Self::from_bytes(&buff)
    }

    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        self.0.secret_key().secret_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.x_only_public_key().0)
    }

    /// Sign a 32-byte digest with Schnorr.
    pub fn sign(&self, digest: &[u8; 32]) -> Result<[u8; 64], KeyError> {
        let secp = Secp256k1::new();
        let msg = Message::from_digest_slice(digest)
            .map_err(|_| anyhow::anyhow!("malformed digest"))?;
        let sig = secp.sign_schnorr_no_aux_rand(&msg, &self.0);
        let mut out = [0u8; 64];
        out.copy_from_slice(sig.as_ref());
        Ok(out)
    }

    /// Derive the symmetric conversation key shared with `other`.
    ///
    /// ECDH over the x-only key (lifted to the even-parity point), then
    /// SHA-256 of the shared point's x coordinate. The x coordinate is
    /// invariant under point negation, which keeps the derivation
    /// symmetric for x-only keys.
    pub fn conversation_key(&self, other: &PublicKey) -> [u8; 32] {
        let full = secp256k1::PublicKey::from_x_only_public_key(other.0, Parity::Even);
        let point = ecdh::shared_secret_point(&full, &self.0.secret_key());
        let hash = Sha256::digest(&point[..32]);
        hash.into()
    }
}
