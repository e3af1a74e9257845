use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};

pub mod ipfs;
pub mod memory;

pub use ipfs::{IpfsBlobStorageConnector, IpfsConfig};
pub use memory::MemoryBlobStorageConnector;

/// Byte-level storage backend for blob payloads.
///
/// Connectors are simple key/value adapters: they store opaque bytes and hand
/// back a backend-specific id. They never see metadata, identities or the
/// locator namespace they were registered under.
#[async_trait]
pub trait BlobStorageConnector: Send + Sync {
    /// Store the blob and return the backend-specific id.
    async fn set(&self, blob: &[u8]) -> Result<String>;

    /// Get the blob. Absence is a valid outcome, not an error.
    async fn get(&self, id: &str) -> Result<Option<Bytes>>;

    /// Remove the blob, reporting whether it was found.
    async fn remove(&self, id: &str) -> Result<bool>;
}

/// Compute the SHA-256 hex digest of the data.
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
