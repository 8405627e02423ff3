//! The signer collaborator.
//!
//! The drive never holds raw key material itself; everything identity
//! shaped goes through this trait so remote or hardware signers can be
//! swapped in. [`LocalSigner`] is the in-process implementation.

use async_trait::async_trait;

use common::crypto::{envelope, EnvelopeError, KeyError, PublicKey, SecretKey};
use common::event::{Event, EventBuilder, EventError};

/// Errors a signer can produce.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("event error: {0}")]
    Event(#[from] EventError),
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

/// Identity, event signing, and the sealed-payload oracle.
#[async_trait]
pub trait Signer: Send + Sync + 'static {
    /// The identity all authored events carry.
    fn public_key(&self) -> PublicKey;

    /// Compute the id and signature for a drafted event.
    async fn sign_event(&self, builder: EventBuilder) -> Result<Event, SignerError>;

    /// Seal a payload shared with `peer` (use the own public key for
    /// self-only payloads).
    async fn seal(&self, plaintext: &[u8], peer: &PublicKey) -> Result<String, SignerError>;

    /// Open a sealed payload shared with `peer`.
    async fn open(&self, payload: &str, peer: &PublicKey) -> Result<Vec<u8>, SignerError>;
}

/// A signer holding its secret key in process.
#[derive(Debug, Clone)]
pub struct LocalSigner {
    key: SecretKey,
}

impl LocalSigner {
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    pub fn generate() -> Self {
        Self::new(SecretKey::generate())
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn public_key(&self) -> PublicKey {
        self.key.public()
    }

    async fn sign_event(&self, builder: EventBuilder) -> Result<Event, SignerError> {
        Ok(builder.sign(&self.key)?)
    }

    async fn seal(&self, plaintext: &[u8], peer: &PublicKey) -> Result<String, SignerError> {
        Ok(envelope::seal(plaintext, &self.key, peer)?)
    }

    async fn open(&self, payload: &str, peer: &PublicKey) -> Result<Vec<u8>, SignerError> {
        Ok(envelope::open(payload, &self.key, peer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_signer_signs_verifiable_events() {
        let signer = LocalSigner::generate();
        let event = signer
            .sign_event(EventBuilder::drive("payload".to_string()))
            .await
            .unwrap();
        assert_eq!(event.pubkey, signer.public_key().to_hex());
        event.verify().unwrap();
    }

    #[tokio::test]
    async fn seal_open_between_signers() {
        let alice = LocalSigner::generate();
        let bob = LocalSigner::generate();
        let sealed = alice.seal(b"hi", &bob.public_key()).await.unwrap();
        let opened = bob.open(&sealed, &alice.public_key()).await.unwrap();
        assert_eq!(opened, b"hi");
    }
}
