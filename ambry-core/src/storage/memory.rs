use super::{compute_hash, BlobStorageConnector};
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory blob storage, content-addressed by SHA-256 hex digest.
///
/// Storing the same bytes twice yields the same id. Intended for tests and
/// single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryBlobStorageConnector {
    store: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBlobStorageConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct payloads currently held.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStorageConnector for MemoryBlobStorageConnector {
    async fn set(&self, blob: &[u8]) -> Result<String> {
        let id = compute_hash(blob);
        let mut store = self.store.write().await;
        store
            .entry(id.clone())
            .or_insert_with(|| Bytes::copy_from_slice(blob));
        tracing::debug!("stored blob {} ({} bytes)", id, blob.len());
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Bytes>> {
        let store = self.store.read().await;
        Ok(store.get(id).cloned())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut store = self.store.write().await;
        Ok(store.remove(id).is_some())
    }
}
