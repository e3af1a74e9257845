use crate::entry::{BlobEntry, EntryDocument, EntryListDocument};
use crate::error::{AmbryError, Result};
use crate::index::{
    EntryFilter, EntryIndex, PropertyComparison, SortDirection, SortSpec,
};
use crate::locator::Locator;
use crate::registry::ConnectorRegistry;
use crate::storage::BlobStorageConnector;
use crate::vault::{EncryptionGate, VaultConnector};
use crate::{jsonld, mime};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Vault key id used when none is configured.
pub const DEFAULT_VAULT_KEY_ID: &str = "blob-storage";

/// Which identities scope storage operations.
///
/// Evaluated once at construction; every operation consults the same flags,
/// so a record either always carries an identity field or never does.
#[derive(Debug, Clone, Copy)]
pub struct ScopingConfig {
    pub include_user_identity: bool,
    pub include_node_identity: bool,
}

impl Default for ScopingConfig {
    fn default() -> Self {
        Self {
            include_user_identity: true,
            include_node_identity: true,
        }
    }
}

/// Sortable entry fields exposed to query callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderField {
    DateCreated,
    DateModified,
}

impl OrderField {
    fn property(&self) -> &'static str {
        match self {
            Self::DateCreated => "dateCreated",
            Self::DateModified => "dateModified",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateEntryRequest {
    /// Payload in base64.
    pub blob: String,
    pub encoding_format: Option<String>,
    pub file_extension: Option<String>,
    pub metadata: Option<Value>,
    pub namespace: Option<String>,
    pub user_identity: Option<String>,
    pub node_identity: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GetEntryRequest {
    pub id: String,
    pub include_content: bool,
    pub user_identity: Option<String>,
    pub node_identity: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateEntryRequest {
    pub id: String,
    pub encoding_format: Option<String>,
    pub file_extension: Option<String>,
    pub metadata: Option<Value>,
    pub user_identity: Option<String>,
    pub node_identity: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoveEntryRequest {
    pub id: String,
    pub user_identity: Option<String>,
    pub node_identity: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryEntriesRequest {
    pub filter: Option<EntryFilter>,
    pub order_by: Option<OrderField>,
    pub order_direction: Option<SortDirection>,
    pub cursor: Option<String>,
    pub page_size: Option<usize>,
    pub user_identity: Option<String>,
    pub node_identity: Option<String>,
}

/// Options for constructing a [`BlobService`].
pub struct BlobServiceOptions {
    pub registry: ConnectorRegistry,
    pub index: Arc<dyn EntryIndex>,
    pub vault: Option<Arc<dyn VaultConnector>>,
    /// Defaults to the first registered namespace.
    pub default_namespace: Option<String>,
    pub vault_key_id: Option<String>,
    pub scoping: ScopingConfig,
}

impl BlobServiceOptions {
    pub fn new(registry: ConnectorRegistry, index: Arc<dyn EntryIndex>) -> Self {
        Self {
            registry,
            index,
            vault: None,
            default_namespace: None,
            vault_key_id: None,
            scoping: ScopingConfig::default(),
        }
    }
}

/// The blob entry orchestration service.
///
/// Each operation is an independent transaction over the metadata index and
/// a storage connector, with the encryption gate on the payload path when
/// configured. The service holds no mutable state; configuration is fixed at
/// construction.
pub struct BlobService {
    registry: ConnectorRegistry,
    index: Arc<dyn EntryIndex>,
    gate: Option<EncryptionGate>,
    default_namespace: String,
    scoping: ScopingConfig,
}

impl BlobService {
    pub fn new(options: BlobServiceOptions) -> Result<Self> {
        if options.registry.is_empty() {
            return Err(AmbryError::Config(
                "no blob storage connectors registered".to_string(),
            ));
        }

        let default_namespace = match options.default_namespace {
            Some(namespace) => {
                if !options.registry.contains(&namespace) {
                    return Err(AmbryError::Config(format!(
                        "default namespace '{namespace}' has no registered connector"
                    )));
                }
                namespace
            }
            None => options
                .registry
                .first_namespace()
                .map(str::to_string)
                .unwrap_or_default(),
        };

        let gate = options.vault.map(|vault| {
            EncryptionGate::new(
                vault,
                options
                    .vault_key_id
                    .unwrap_or_else(|| DEFAULT_VAULT_KEY_ID.to_string()),
            )
        });

        Ok(Self {
            registry: options.registry,
            index: options.index,
            gate,
            default_namespace,
            scoping: options.scoping,
        })
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Create a blob entry from a base64 payload. Returns the locator for
    /// later retrieval.
    ///
    /// Guard failures (bad base64, missing identities) surface before any
    /// side effect; failures past that point are wrapped as `CreateFailed`
    /// with the cause attached.
    pub async fn create(&self, request: CreateEntryRequest) -> Result<Locator> {
        let CreateEntryRequest {
            blob,
            encoding_format,
            file_extension,
            metadata,
            namespace,
            user_identity,
            node_identity,
        } = request;

        let raw = STANDARD
            .decode(blob.as_bytes())
            .map_err(|error| AmbryError::validation("blob", format!("invalid base64: {error}")))?;
        let user_identity = self.guard_user(user_identity.as_deref())?;
        let node_identity = self.guard_node(node_identity.as_deref(), self.gate.is_some())?;

        self.create_inner(
            raw,
            encoding_format,
            file_extension,
            metadata,
            namespace,
            user_identity,
            node_identity,
        )
        .await
        .map_err(|error| AmbryError::CreateFailed(Box::new(error)))
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_inner(
        &self,
        raw: Vec<u8>,
        mut encoding_format: Option<String>,
        mut file_extension: Option<String>,
        metadata: Option<Value>,
        namespace: Option<String>,
        user_identity: Option<&str>,
        node_identity: Option<&str>,
    ) -> Result<Locator> {
        let namespace = namespace.unwrap_or_else(|| self.default_namespace.clone());
        let connector = self.registry.resolve(&namespace)?;

        // Size of the payload before encryption; never recomputed.
        let blob_size = raw.len() as u64;

        // Detection has to happen on the unencrypted data.
        if encoding_format.is_none() {
            encoding_format = mime::detect(&raw).map(str::to_string);
        }
        if file_extension.is_none() {
            if let Some(format) = encoding_format.as_deref() {
                file_extension = mime::default_extension(format).map(str::to_string);
            }
        }

        if let Some(metadata) = metadata.as_ref() {
            self.validate_metadata(metadata)?;
        }

        let store_blob = match (&self.gate, node_identity) {
            (Some(gate), Some(node)) => gate.protect(node, &raw).await?,
            _ => raw,
        };

        let backend_id = connector.set(&store_blob).await?;
        let locator = Locator::new(namespace, backend_id);

        let entry = BlobEntry {
            id: locator.clone(),
            date_created: Utc::now(),
            date_modified: None,
            blob_size,
            encoding_format,
            file_extension,
            metadata,
            user_identity: self.stamp_user(user_identity),
            node_identity: self.stamp_node(node_identity),
        };

        let conditions = self.identity_conditions(user_identity, node_identity);
        self.index.put(entry, &conditions).await?;

        tracing::debug!("created blob entry {} ({} bytes)", locator, blob_size);
        Ok(locator)
    }

    /// Get the entry for a locator, optionally with its payload.
    ///
    /// A record outside the caller's identity scope is indistinguishable
    /// from one that does not exist.
    pub async fn get(&self, request: GetEntryRequest) -> Result<EntryDocument> {
        let GetEntryRequest {
            id,
            include_content,
            user_identity,
            node_identity,
        } = request;

        let locator = Locator::parse(&id)?;
        let user_identity = self.guard_user(user_identity.as_deref())?;
        let node_identity = self.guard_node(
            node_identity.as_deref(),
            self.gate.is_some() && include_content,
        )?;
        // Namespace routing is checked before any store access.
        let connector = self.connector_for(&locator)?;

        self.get_inner(
            locator,
            connector,
            include_content,
            user_identity,
            node_identity,
        )
        .await
        .map_err(|error| AmbryError::GetFailed(Box::new(error)))
    }

    async fn get_inner(
        &self,
        locator: Locator,
        connector: Arc<dyn BlobStorageConnector>,
        include_content: bool,
        user_identity: Option<&str>,
        node_identity: Option<&str>,
    ) -> Result<EntryDocument> {
        let conditions = self.identity_conditions(user_identity, node_identity);
        let entry = self
            .index
            .get(&locator, &conditions)
            .await?
            .ok_or_else(|| AmbryError::NotFound(locator.to_string()))?;

        let mut blob = None;
        if include_content {
            // An index record without backend content is treated as
            // not-found; the caller cannot act on the difference.
            let stored = connector
                .get(locator.id())
                .await?
                .ok_or_else(|| AmbryError::NotFound(locator.to_string()))?;

            let bytes = match (&self.gate, node_identity) {
                (Some(gate), Some(node)) => gate.reveal(node, &stored).await?,
                _ => stored.to_vec(),
            };
            blob = Some(bytes);
        }

        Ok(entry.to_document(blob.as_deref()))
    }

    /// Update the mutable fields of an entry. `id`, `dateCreated` and
    /// `blobSize` are preserved; unsupplied fields retain their values.
    ///
    /// The existing record is read unscoped by key, but the write-back is
    /// re-stamped with the caller's identities and guarded by identity
    /// conditions at the index layer.
    pub async fn update(&self, request: UpdateEntryRequest) -> Result<()> {
        let UpdateEntryRequest {
            id,
            encoding_format,
            file_extension,
            metadata,
            user_identity,
            node_identity,
        } = request;

        let locator = Locator::parse(&id)?;
        let user_identity = self.guard_user(user_identity.as_deref())?;
        let node_identity = self.guard_node(node_identity.as_deref(), self.gate.is_some())?;

        self.update_inner(
            locator,
            encoding_format,
            file_extension,
            metadata,
            user_identity,
            node_identity,
        )
        .await
        .map_err(|error| AmbryError::UpdateFailed(Box::new(error)))
    }

    async fn update_inner(
        &self,
        locator: Locator,
        encoding_format: Option<String>,
        file_extension: Option<String>,
        metadata: Option<Value>,
        user_identity: Option<&str>,
        node_identity: Option<&str>,
    ) -> Result<()> {
        let existing = self
            .index
            .get(&locator, &[])
            .await?
            .ok_or_else(|| AmbryError::NotFound(locator.to_string()))?;

        if let Some(metadata) = metadata.as_ref() {
            self.validate_metadata(metadata)?;
        }

        let updated = BlobEntry {
            id: existing.id,
            date_created: existing.date_created,
            date_modified: Some(Utc::now()),
            blob_size: existing.blob_size,
            encoding_format: encoding_format.or(existing.encoding_format),
            file_extension: file_extension.or(existing.file_extension),
            metadata: metadata.or(existing.metadata),
            user_identity: self.stamp_user(user_identity),
            node_identity: self.stamp_node(node_identity),
        };

        let conditions = self.identity_conditions(user_identity, node_identity);
        self.index.put(updated, &conditions).await
    }

    /// Remove the entry and its payload.
    ///
    /// The metadata record is deleted first; if the backend then reports the
    /// payload as absent the whole operation fails with not-found even
    /// though the record is already gone. Deletions are not atomic across
    /// the two stores and orphaned payloads are reconciled out of band.
    pub async fn remove(&self, request: RemoveEntryRequest) -> Result<()> {
        let RemoveEntryRequest {
            id,
            user_identity,
            node_identity,
        } = request;

        let locator = Locator::parse(&id)?;
        let user_identity = self.guard_user(user_identity.as_deref())?;
        let node_identity = self.guard_node(node_identity.as_deref(), self.gate.is_some())?;
        // Namespace routing is checked before any deletion happens.
        let connector = self.connector_for(&locator)?;

        self.remove_inner(locator, connector, user_identity, node_identity)
            .await
            .map_err(|error| AmbryError::RemoveFailed(Box::new(error)))
    }

    async fn remove_inner(
        &self,
        locator: Locator,
        connector: Arc<dyn BlobStorageConnector>,
        user_identity: Option<&str>,
        node_identity: Option<&str>,
    ) -> Result<()> {
        let conditions = self.identity_conditions(user_identity, node_identity);
        self.index.remove(&locator, &conditions).await?;

        let removed = connector.remove(locator.id()).await?;
        if !removed {
            return Err(AmbryError::NotFound(locator.to_string()));
        }

        tracing::debug!("removed blob entry {}", locator);
        Ok(())
    }

    /// Query entries matching the conditions, scoped to the caller's
    /// identities. Defaults to creation time, descending.
    pub async fn query(&self, request: QueryEntriesRequest) -> Result<EntryListDocument> {
        let QueryEntriesRequest {
            filter,
            order_by,
            order_direction,
            cursor,
            page_size,
            user_identity,
            node_identity,
        } = request;

        let mut filters = Vec::new();
        if self.scoping.include_node_identity {
            let node = require_identity(node_identity.as_deref(), "nodeIdentity")?;
            filters.push(EntryFilter::equals("nodeIdentity", node));
        }
        if self.scoping.include_user_identity {
            let user = require_identity(user_identity.as_deref(), "userIdentity")?;
            filters.push(EntryFilter::equals("userIdentity", user));
        }
        if let Some(filter) = filter {
            filters.push(filter);
        }

        let filter = match filters.len() {
            0 => None,
            _ => Some(EntryFilter::all(filters)),
        };

        let sort = [SortSpec {
            property: order_by.unwrap_or(OrderField::DateCreated).property().to_string(),
            direction: order_direction.unwrap_or(SortDirection::Descending),
        }];

        let page = self
            .index
            .query(filter.as_ref(), &sort, cursor.as_deref(), page_size)
            .await?;

        let entries = page
            .entries
            .iter()
            .map(|entry| entry.to_document(None))
            .collect();

        Ok(EntryListDocument::new(entries, page.cursor))
    }

    fn validate_metadata(&self, metadata: &Value) -> Result<()> {
        let mut failures = Vec::new();
        jsonld::validate(metadata, &mut failures);
        if !failures.is_empty() {
            return Err(AmbryError::InvalidMetadata(failures));
        }
        Ok(())
    }

    /// Resolve the connector for a locator; an unregistered namespace is a
    /// routing error, not a lookup miss.
    fn connector_for(&self, locator: &Locator) -> Result<Arc<dyn BlobStorageConnector>> {
        self.registry.resolve(locator.namespace()).map_err(|_| {
            AmbryError::NamespaceMismatch {
                expected: self.registry.names().join(" | "),
                got: locator.namespace().to_string(),
            }
        })
    }

    fn guard_user<'a>(&self, user_identity: Option<&'a str>) -> Result<Option<&'a str>> {
        if self.scoping.include_user_identity {
            require_identity(user_identity, "userIdentity").map(Some)
        } else {
            Ok(user_identity)
        }
    }

    fn guard_node<'a>(
        &self,
        node_identity: Option<&'a str>,
        needed_for_vault: bool,
    ) -> Result<Option<&'a str>> {
        if self.scoping.include_node_identity || needed_for_vault {
            require_identity(node_identity, "nodeIdentity").map(Some)
        } else {
            Ok(node_identity)
        }
    }

    fn stamp_user(&self, user_identity: Option<&str>) -> Option<String> {
        self.scoping
            .include_user_identity
            .then(|| user_identity.map(str::to_string))
            .flatten()
    }

    fn stamp_node(&self, node_identity: Option<&str>) -> Option<String> {
        self.scoping
            .include_node_identity
            .then(|| node_identity.map(str::to_string))
            .flatten()
    }

    fn identity_conditions(
        &self,
        user_identity: Option<&str>,
        node_identity: Option<&str>,
    ) -> Vec<PropertyComparison> {
        let mut conditions = Vec::new();
        if self.scoping.include_user_identity {
            if let Some(user) = user_identity {
                conditions.push(PropertyComparison::equals("userIdentity", user));
            }
        }
        if self.scoping.include_node_identity {
            if let Some(node) = node_identity {
                conditions.push(PropertyComparison::equals("nodeIdentity", node));
            }
        }
        conditions
    }
}

fn require_identity<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(AmbryError::MissingIdentity(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryEntryIndex;
    use crate::storage::MemoryBlobStorageConnector;
    use crate::vault::MemoryVaultConnector;
    use serde_json::json;

    struct Fixture {
        service: BlobService,
        backend: Arc<MemoryBlobStorageConnector>,
        index: Arc<MemoryEntryIndex>,
    }

    fn fixture() -> Fixture {
        fixture_with(|options| options)
    }

    fn fixture_with(
        configure: impl FnOnce(BlobServiceOptions) -> BlobServiceOptions,
    ) -> Fixture {
        let backend = Arc::new(MemoryBlobStorageConnector::new());
        let index = Arc::new(MemoryEntryIndex::new());

        let mut registry = ConnectorRegistry::new();
        registry.register("memory", backend.clone());

        let options = configure(BlobServiceOptions::new(registry, index.clone()));
        Fixture {
            service: BlobService::new(options).unwrap(),
            backend,
            index,
        }
    }

    fn create_request(blob: &str) -> CreateEntryRequest {
        CreateEntryRequest {
            blob: blob.to_string(),
            user_identity: Some("user-1".to_string()),
            node_identity: Some("node-1".to_string()),
            ..Default::default()
        }
    }

    fn get_request(id: &str, include_content: bool) -> GetEntryRequest {
        GetEntryRequest {
            id: id.to_string(),
            include_content,
            user_identity: Some("user-1".to_string()),
            node_identity: Some("node-1".to_string()),
        }
    }

    fn remove_request(id: &str) -> RemoveEntryRequest {
        RemoveEntryRequest {
            id: id.to_string(),
            user_identity: Some("user-1".to_string()),
            node_identity: Some("node-1".to_string()),
        }
    }

    fn query_request() -> QueryEntriesRequest {
        QueryEntriesRequest {
            user_identity: Some("user-1".to_string()),
            node_identity: Some("node-1".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trip() {
        let f = fixture();

        let locator = f.service.create(create_request("AQIDBA==")).await.unwrap();
        assert_eq!(locator.namespace(), "memory");

        let document = f
            .service
            .get(get_request(&locator.to_string(), true))
            .await
            .unwrap();
        assert_eq!(document.blob.as_deref(), Some("AQIDBA=="));
        assert_eq!(document.blob_size, 4);
        assert_eq!(document.id, locator);
    }

    #[tokio::test]
    async fn get_without_content_omits_blob() {
        let f = fixture();
        let locator = f.service.create(create_request("AQIDBA==")).await.unwrap();

        let document = f
            .service
            .get(get_request(&locator.to_string(), false))
            .await
            .unwrap();
        assert!(document.blob.is_none());
        assert_eq!(document.blob_size, 4);
    }

    #[tokio::test]
    async fn create_rejects_invalid_base64_before_any_write() {
        let f = fixture();

        let error = f
            .service
            .create(create_request("not base64 !!!"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            AmbryError::Validation { ref property, .. } if property == "blob"
        ));
        assert_eq!(f.backend.len().await, 0);
        assert!(f.index.is_empty().await);
    }

    #[tokio::test]
    async fn create_detects_encoding_and_extension() {
        let f = fixture();
        let blob = STANDARD.encode(b"%PDF-1.7 content");

        let locator = f
            .service
            .create(CreateEntryRequest {
                blob,
                ..create_request("")
            })
            .await
            .unwrap();

        let document = f
            .service
            .get(get_request(&locator.to_string(), false))
            .await
            .unwrap();
        assert_eq!(document.encoding_format.as_deref(), Some("application/pdf"));
        assert_eq!(document.file_extension.as_deref(), Some("pdf"));
    }

    #[tokio::test]
    async fn create_rejects_invalid_metadata() {
        let f = fixture();

        let error = f
            .service
            .create(CreateEntryRequest {
                metadata: Some(json!("not an object")),
                ..create_request("AQIDBA==")
            })
            .await
            .unwrap_err();
        assert!(matches!(
            error.root_cause(),
            AmbryError::InvalidMetadata(_)
        ));
        assert_eq!(f.backend.len().await, 0);
    }

    #[tokio::test]
    async fn create_with_unknown_namespace_is_wrapped() {
        let f = fixture();

        let error = f
            .service
            .create(CreateEntryRequest {
                namespace: Some("s3".to_string()),
                ..create_request("AQIDBA==")
            })
            .await
            .unwrap_err();
        assert!(matches!(error, AmbryError::CreateFailed(_)));
        assert!(matches!(
            error.root_cause(),
            AmbryError::NoBackendRegistered(namespace) if namespace == "s3"
        ));
    }

    #[tokio::test]
    async fn get_with_unregistered_namespace_is_namespace_mismatch() {
        let f = fixture();

        let error = f
            .service
            .get(get_request("s3:abc123", true))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            AmbryError::NamespaceMismatch { ref got, .. } if got == "s3"
        ));
    }

    #[tokio::test]
    async fn get_missing_entry_is_wrapped_not_found() {
        let f = fixture();

        let error = f
            .service
            .get(get_request("memory:deadbeef", true))
            .await
            .unwrap_err();
        assert!(matches!(error, AmbryError::GetFailed(_)));
        assert!(matches!(error.root_cause(), AmbryError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_outside_identity_scope_is_not_found() {
        let f = fixture();
        let locator = f.service.create(create_request("AQIDBA==")).await.unwrap();

        let error = f
            .service
            .get(GetEntryRequest {
                user_identity: Some("user-2".to_string()),
                ..get_request(&locator.to_string(), false)
            })
            .await
            .unwrap_err();
        assert!(matches!(error.root_cause(), AmbryError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_preserves_immutable_fields() {
        let f = fixture();
        let locator = f.service.create(create_request("AQIDBA==")).await.unwrap();
        let before = f
            .service
            .get(get_request(&locator.to_string(), false))
            .await
            .unwrap();

        f.service
            .update(UpdateEntryRequest {
                id: locator.to_string(),
                encoding_format: Some("application/octet-stream".to_string()),
                user_identity: Some("user-1".to_string()),
                node_identity: Some("node-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let after = f
            .service
            .get(get_request(&locator.to_string(), false))
            .await
            .unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.date_created, before.date_created);
        assert_eq!(after.blob_size, before.blob_size);
        assert_eq!(
            after.encoding_format.as_deref(),
            Some("application/octet-stream")
        );
        assert!(after.date_modified.is_some());
    }

    #[tokio::test]
    async fn sequential_updates_retain_unsupplied_fields() {
        let f = fixture();
        let locator = f.service.create(create_request("AQIDBA==")).await.unwrap();

        f.service
            .update(UpdateEntryRequest {
                id: locator.to_string(),
                encoding_format: Some("application/pdf".to_string()),
                user_identity: Some("user-1".to_string()),
                node_identity: Some("node-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        f.service
            .update(UpdateEntryRequest {
                id: locator.to_string(),
                metadata: Some(json!({ "@type": "DigitalDocument" })),
                user_identity: Some("user-1".to_string()),
                node_identity: Some("node-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let document = f
            .service
            .get(get_request(&locator.to_string(), false))
            .await
            .unwrap();
        assert_eq!(document.encoding_format.as_deref(), Some("application/pdf"));
        assert!(document.metadata.is_some());
    }

    #[tokio::test]
    async fn update_missing_entry_is_wrapped_not_found() {
        let f = fixture();

        let error = f
            .service
            .update(UpdateEntryRequest {
                id: "memory:deadbeef".to_string(),
                user_identity: Some("user-1".to_string()),
                node_identity: Some("node-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(error, AmbryError::UpdateFailed(_)));
        assert!(matches!(error.root_cause(), AmbryError::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_deletes_metadata_and_payload() {
        let f = fixture();
        let locator = f.service.create(create_request("AQIDBA==")).await.unwrap();

        f.service
            .remove(remove_request(&locator.to_string()))
            .await
            .unwrap();

        assert!(f.index.is_empty().await);
        assert_eq!(f.backend.len().await, 0);

        let error = f
            .service
            .get(get_request(&locator.to_string(), false))
            .await
            .unwrap_err();
        assert!(matches!(error.root_cause(), AmbryError::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_with_out_of_band_deleted_payload_is_not_found() {
        let f = fixture();
        let locator = f.service.create(create_request("AQIDBA==")).await.unwrap();

        // Payload vanishes behind the orchestrator's back.
        assert!(f.backend.remove(locator.id()).await.unwrap());

        let error = f
            .service
            .remove(remove_request(&locator.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(error, AmbryError::RemoveFailed(_)));
        assert!(matches!(error.root_cause(), AmbryError::NotFound(_)));
        // The metadata record is already gone when the found flag is checked.
        assert!(f.index.is_empty().await);
    }

    #[tokio::test]
    async fn remove_missing_entry_is_wrapped_not_found() {
        let f = fixture();

        let error = f
            .service
            .remove(remove_request("memory:deadbeef"))
            .await
            .unwrap_err();
        assert!(matches!(error, AmbryError::RemoveFailed(_)));
        assert!(matches!(error.root_cause(), AmbryError::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_with_unregistered_namespace_leaves_metadata_intact() {
        let f = fixture();
        f.service.create(create_request("AQIDBA==")).await.unwrap();

        let error = f
            .service
            .remove(remove_request("s3:abc123"))
            .await
            .unwrap_err();
        assert!(matches!(error, AmbryError::NamespaceMismatch { .. }));
        assert_eq!(f.index.len().await, 1);
    }

    #[tokio::test]
    async fn missing_identities_are_guarded() {
        let f = fixture();

        let error = f
            .service
            .create(CreateEntryRequest {
                user_identity: None,
                ..create_request("AQIDBA==")
            })
            .await
            .unwrap_err();
        assert!(matches!(error, AmbryError::MissingIdentity("userIdentity")));

        let error = f
            .service
            .create(CreateEntryRequest {
                node_identity: Some(String::new()),
                ..create_request("AQIDBA==")
            })
            .await
            .unwrap_err();
        assert!(matches!(error, AmbryError::MissingIdentity("nodeIdentity")));
    }

    #[tokio::test]
    async fn disabled_scoping_accepts_anonymous_callers() {
        let f = fixture_with(|mut options| {
            options.scoping = ScopingConfig {
                include_user_identity: false,
                include_node_identity: false,
            };
            options
        });

        let locator = f
            .service
            .create(CreateEntryRequest {
                blob: "AQIDBA==".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let document = f
            .service
            .get(GetEntryRequest {
                id: locator.to_string(),
                include_content: true,
                user_identity: None,
                node_identity: None,
            })
            .await
            .unwrap();
        assert_eq!(document.blob.as_deref(), Some("AQIDBA=="));
    }

    #[tokio::test]
    async fn query_is_scoped_to_caller_identities() {
        let f = fixture();
        f.service.create(create_request("AQIDBA==")).await.unwrap();
        f.service
            .create(CreateEntryRequest {
                blob: STANDARD.encode(b"other"),
                user_identity: Some("user-2".to_string()),
                node_identity: Some("node-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let list = f.service.query(query_request()).await.unwrap();
        assert_eq!(list.entries.len(), 1);
        assert!(list.entries.iter().all(|entry| entry.blob.is_none()));
    }

    #[tokio::test]
    async fn query_paginates_with_cursor() {
        let f = fixture();
        for i in 0..5u8 {
            f.service
                .create(create_request(&STANDARD.encode([i])))
                .await
                .unwrap();
        }

        let first = f
            .service
            .query(QueryEntriesRequest {
                page_size: Some(3),
                ..query_request()
            })
            .await
            .unwrap();
        assert_eq!(first.entries.len(), 3);
        let cursor = first.cursor.expect("more pages expected");

        let second = f
            .service
            .query(QueryEntriesRequest {
                page_size: Some(3),
                cursor: Some(cursor),
                ..query_request()
            })
            .await
            .unwrap();
        assert_eq!(second.entries.len(), 2);
        assert!(second.cursor.is_none());
    }

    #[tokio::test]
    async fn query_without_identities_is_guarded() {
        let f = fixture();

        let error = f
            .service
            .query(QueryEntriesRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(error, AmbryError::MissingIdentity(_)));
    }

    #[tokio::test]
    async fn encryption_round_trip_stores_ciphertext() {
        let f = fixture_with(|mut options| {
            options.vault = Some(Arc::new(MemoryVaultConnector::generate()));
            options
        });

        let plaintext = b"confidential payload";
        let locator = f
            .service
            .create(create_request(&STANDARD.encode(plaintext)))
            .await
            .unwrap();

        // The backend id is the hash of the ciphertext, never the plaintext.
        assert_ne!(locator.id(), crate::storage::compute_hash(plaintext));
        let stored = f.backend.get(locator.id()).await.unwrap().unwrap();
        assert_ne!(stored.as_ref(), plaintext.as_slice());

        let document = f
            .service
            .get(get_request(&locator.to_string(), true))
            .await
            .unwrap();
        assert_eq!(document.blob.as_deref(), Some(STANDARD.encode(plaintext).as_str()));
        assert_eq!(document.blob_size, plaintext.len() as u64);
    }

    #[tokio::test]
    async fn encryption_requires_node_identity_even_when_unscoped() {
        let f = fixture_with(|mut options| {
            options.vault = Some(Arc::new(MemoryVaultConnector::generate()));
            options.scoping = ScopingConfig {
                include_user_identity: false,
                include_node_identity: false,
            };
            options
        });

        let error = f
            .service
            .create(CreateEntryRequest {
                blob: "AQIDBA==".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(error, AmbryError::MissingIdentity("nodeIdentity")));
    }

    #[tokio::test]
    async fn default_namespace_is_first_registered() {
        let backend = Arc::new(MemoryBlobStorageConnector::new());
        let mut registry = ConnectorRegistry::new();
        registry.register("archive", backend.clone());
        registry.register("memory", backend);

        let service = BlobService::new(BlobServiceOptions::new(
            registry,
            Arc::new(MemoryEntryIndex::new()),
        ))
        .unwrap();
        assert_eq!(service.default_namespace(), "archive");
    }

    #[test]
    fn empty_registry_is_a_configuration_error() {
        let options = BlobServiceOptions::new(
            ConnectorRegistry::new(),
            Arc::new(MemoryEntryIndex::new()),
        );
        assert!(matches!(
            BlobService::new(options),
            Err(AmbryError::Config(_))
        ));
    }

    #[test]
    fn unregistered_default_namespace_is_a_configuration_error() {
        let mut registry = ConnectorRegistry::new();
        registry.register("memory", Arc::new(MemoryBlobStorageConnector::new()));

        let mut options =
            BlobServiceOptions::new(registry, Arc::new(MemoryEntryIndex::new()));
        options.default_namespace = Some("s3".to_string());
        assert!(matches!(
            BlobService::new(options),
            Err(AmbryError::Config(_))
        ));
    }
}
