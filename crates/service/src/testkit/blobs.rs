//! An in-memory content-addressed blob store double.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::blobs::{BlobClient, BlobDescriptor};

#[derive(Debug, thiserror::Error)]
pub enum MemoryBlobError {
    #[error("blob not found: {0}")]
    NotFound(String),
}

/// Blobs keyed by the SHA-256 hex of their bytes.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, sha256: &str) -> bool {
        self.inner.read().contains_key(sha256)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobClient for MemoryBlobStore {
    type Error = MemoryBlobError;

    async fn put(&self, bytes: Vec<u8>) -> Result<BlobDescriptor, Self::Error> {
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let size = bytes.len() as u64;
        self.inner.write().insert(sha256.clone(), bytes);
        Ok(BlobDescriptor { sha256, size })
    }

    async fn get(&self, sha256: &str) -> Result<Vec<u8>, Self::Error> {
        self.inner
            .read()
            .get(sha256)
            .cloned()
            .ok_or_else(|| MemoryBlobError::NotFound(sha256.to_string()))
    }

    async fn delete(&self, sha256: &str) -> Result<(), Self::Error> {
        self.inner.write().remove(sha256);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryBlobStore::new();
        let descriptor = store.put(b"hello".to_vec()).await.unwrap();
        assert_eq!(descriptor.size, 5);
        assert!(store.contains(&descriptor.sha256));

        assert_eq!(store.get(&descriptor.sha256).await.unwrap(), b"hello");
        store.delete(&descriptor.sha256).await.unwrap();
        assert!(matches!(
            store.get(&descriptor.sha256).await,
            Err(MemoryBlobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn addresses_are_content_derived() {
        let store = MemoryBlobStore::new();
        let a = store.put(b"same".to_vec()).await.unwrap();
        let b = store.put(b"same".to_vec()).await.unwrap();
        assert_eq!(a.sha256, b.sha256);
        assert_eq!(store.len(), 1);
    }
}
