//! Ambry Core - Content-addressed blob storage middle tier
//!
//! Orchestrates blob entries across pluggable storage backends:
//! - Namespace-routed locators over a connector registry
//! - Optional at-rest encryption keyed per node identity
//! - JSON-LD metadata records in a conditionable entry index
//! - Identity-scoped create/get/update/remove/query operations

pub mod entry;
pub mod error;
pub mod index;
pub mod jsonld;
pub mod locator;
pub mod mime;
pub mod registry;
pub mod service;
pub mod storage;
pub mod vault;

pub use entry::{
    BlobEntry, EntryDocument, EntryListDocument, BLOB_STORAGE_CONTEXT, ENTRY_LIST_TYPE,
    ENTRY_TYPE, SCHEMA_ORG_CONTEXT,
};
pub use error::{AmbryError, Result};
pub use index::{
    ComparisonOp, EntryFilter, EntryIndex, EntryPage, LogicalOp, MemoryEntryIndex,
    PropertyComparison, SortDirection, SortSpec, DEFAULT_PAGE_SIZE,
};
pub use jsonld::ValidationFailure;
pub use locator::{Locator, LOCATOR_DELIMITER};
pub use registry::ConnectorRegistry;
pub use service::{
    BlobService, BlobServiceOptions, CreateEntryRequest, GetEntryRequest, OrderField,
    QueryEntriesRequest, RemoveEntryRequest, ScopingConfig, UpdateEntryRequest,
    DEFAULT_VAULT_KEY_ID,
};
pub use storage::{
    compute_hash, BlobStorageConnector, IpfsBlobStorageConnector, IpfsConfig,
    MemoryBlobStorageConnector,
};
pub use vault::{EncryptionGate, EncryptionType, MemoryVaultConnector, VaultConnector};
