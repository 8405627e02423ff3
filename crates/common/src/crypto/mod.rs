//! Cryptographic building blocks.
//!
//! - [`keys`]: secp256k1 keypairs, Schnorr signatures, and the ECDH
//!   conversation key shared by two parties.
//! - [`secret`]: AES-256-GCM content encryption for file bytes.
//! - [`envelope`]: the authenticated public-key seal that protects
//!   metadata at rest (callers treat it as opaque).
//! - [`keywrap`]: password-locked private-key envelopes (`ncryptsec`).

pub mod envelope;
pub mod keys;
pub mod keywrap;
pub mod secret;

pub use envelope::{open, seal, EnvelopeError};
pub use keys::{KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE};
pub use keywrap::{lock_key, unlock_key, KeywrapError};
pub use secret::{
    ContentSecret, SecretError, CONTENT_ALGORITHM, KEY_SIZE, NONCE_SIZE, TAG_SIZE,
};
