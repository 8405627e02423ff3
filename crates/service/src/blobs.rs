//! The blob network collaborator.
//!
//! A content-addressed object store keyed by the SHA-256 of the stored
//! bytes; untrusted. Bytes are ciphertext whenever encryption is
//! enabled, so the store never sees plaintext.

use std::fmt::{Debug, Display};

use async_trait::async_trait;

/// What the blob network reports back for an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobDescriptor {
    /// SHA-256 of the stored bytes, hex.
    pub sha256: String,
    /// Stored length in bytes.
    pub size: u64,
}

/// The blob network.
#[async_trait]
pub trait BlobClient: Send + Sync + Clone + 'static {
    type Error: Display + Debug + Send + Sync;

    /// Store bytes, returning their content address.
    async fn put(&self, bytes: Vec<u8>) -> Result<BlobDescriptor, Self::Error>;

    /// Fetch bytes by content address.
    async fn get(&self, sha256: &str) -> Result<Vec<u8>, Self::Error>;

    /// Ask the network to forget a blob. Servers may refuse.
    async fn delete(&self, sha256: &str) -> Result<(), Self::Error>;
}
