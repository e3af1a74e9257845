use crate::locator::Locator;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Context root for blob storage documents.
pub const BLOB_STORAGE_CONTEXT: &str = "https://schema.ambry.dev/blob-storage/";

/// Schema.org context root.
pub const SCHEMA_ORG_CONTEXT: &str = "https://schema.org";

pub const ENTRY_TYPE: &str = "BlobStorageEntry";
pub const ENTRY_LIST_TYPE: &str = "BlobStorageEntryList";

/// Persisted metadata record for a stored blob.
///
/// `id`, `date_created` and `blob_size` are set at creation and never change;
/// `blob_size` is the byte length of the unencrypted payload. The identity
/// fields exist only when the matching scoping flag is enabled and are
/// stripped before any external representation is produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobEntry {
    pub id: Locator,
    pub date_created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<DateTime<Utc>>,
    pub blob_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_identity: Option<String>,
}

impl BlobEntry {
    /// Map the record to its external representation, optionally attaching
    /// the payload base64-encoded. Identity fields are dropped here.
    pub fn to_document(&self, blob: Option<&[u8]>) -> EntryDocument {
        EntryDocument {
            context: vec![
                BLOB_STORAGE_CONTEXT.to_string(),
                SCHEMA_ORG_CONTEXT.to_string(),
            ],
            id: self.id.clone(),
            entry_type: ENTRY_TYPE.to_string(),
            date_created: self.date_created,
            date_modified: self.date_modified,
            blob_size: self.blob_size,
            encoding_format: self.encoding_format.clone(),
            file_extension: self.file_extension.clone(),
            metadata: self.metadata.clone(),
            blob: blob.map(|bytes| STANDARD.encode(bytes)),
        }
    }
}

/// Externally exposed representation of an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: Locator,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub date_created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<DateTime<Utc>>,
    pub blob_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// Externally exposed list of entries plus an optional continuation cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryListDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub list_type: String,
    pub entries: Vec<EntryDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl EntryListDocument {
    pub fn new(entries: Vec<EntryDocument>, cursor: Option<String>) -> Self {
        Self {
            context: vec![
                BLOB_STORAGE_CONTEXT.to_string(),
                SCHEMA_ORG_CONTEXT.to_string(),
            ],
            list_type: ENTRY_LIST_TYPE.to_string(),
            entries,
            cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry() -> BlobEntry {
        BlobEntry {
            id: Locator::new("memory", "abc123"),
            date_created: Utc::now(),
            date_modified: None,
            blob_size: 4,
            encoding_format: Some("application/pdf".to_string()),
            file_extension: Some("pdf".to_string()),
            metadata: Some(json!({ "@type": "DigitalDocument" })),
            user_identity: Some("user-1".to_string()),
            node_identity: Some("node-1".to_string()),
        }
    }

    #[test]
    fn document_strips_identity_fields() {
        let document = entry().to_document(None);
        let value = serde_json::to_value(&document).unwrap();
        assert!(value.get("userIdentity").is_none());
        assert!(value.get("nodeIdentity").is_none());
        assert_eq!(value["type"], ENTRY_TYPE);
        assert_eq!(value["@context"][0], BLOB_STORAGE_CONTEXT);
    }

    #[test]
    fn document_encodes_blob_as_base64() {
        let document = entry().to_document(Some(&[1, 2, 3, 4]));
        assert_eq!(document.blob.as_deref(), Some("AQIDBA=="));
        assert_eq!(document.blob_size, 4);
    }

    #[test]
    fn record_serializes_camel_case_and_skips_absent_fields() {
        let mut record = entry();
        record.encoding_format = None;
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], "memory:abc123");
        assert_eq!(value["blobSize"], 4);
        assert!(value.get("encodingFormat").is_none());
        assert!(value.get("dateModified").is_none());
        assert_eq!(value["userIdentity"], "user-1");
    }
}
