use super::BlobStorageConnector;
use crate::error::{AmbryError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

/// Configuration for the IPFS pinning connector.
#[derive(Debug, Clone)]
pub struct IpfsConfig {
    /// Base URL of the Kubo RPC API, e.g. `http://127.0.0.1:5001/api/v0`.
    pub api_url: String,
    /// Optional bearer token for authenticated gateways.
    pub bearer_token: Option<String>,
}

/// Blob storage connector backed by the IPFS Kubo RPC API.
///
/// Payloads are added with `pin=true` and the returned CID is the backend id.
/// Fetch and unpin failures degrade to absence / not-found, matching the
/// semantics the orchestrator expects from any connector.
pub struct IpfsBlobStorageConnector {
    config: IpfsConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

impl IpfsBlobStorageConnector {
    pub fn new(mut config: IpfsConfig) -> Self {
        while config.api_url.ends_with('/') {
            config.api_url.pop();
        }
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, url: String) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(url);
        if let Some(token) = &self.config.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}

#[async_trait]
impl BlobStorageConnector for IpfsBlobStorageConnector {
    async fn set(&self, blob: &[u8]) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(blob.to_vec())
            .file_name("blob")
            .mime_str("application/octet-stream")
            .map_err(|error| AmbryError::Backend(error.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .request(format!("{}/add?pin=true", self.config.api_url))
            .multipart(form)
            .send()
            .await
            .map_err(|error| AmbryError::Backend(error.to_string()))?;

        if !response.status().is_success() {
            return Err(AmbryError::Backend(format!(
                "ipfs add failed: status={}",
                response.status()
            )));
        }

        let payload: AddResponse = response
            .json()
            .await
            .map_err(|error| AmbryError::Backend(error.to_string()))?;

        Ok(payload.hash)
    }

    async fn get(&self, id: &str) -> Result<Option<Bytes>> {
        let response = match self
            .request(format!("{}/cat?arg={}", self.config.api_url, id))
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!("ipfs cat request failed for {}: {}", id, error);
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            tracing::warn!("ipfs cat returned status {} for {}", response.status(), id);
            return Ok(None);
        }

        match response.bytes().await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) => {
                tracing::warn!("ipfs cat body read failed for {}: {}", id, error);
                Ok(None)
            }
        }
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let response = match self
            .request(format!("{}/pin/rm?arg={}", self.config.api_url, id))
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!("ipfs pin/rm request failed for {}: {}", id, error);
                return Ok(false);
            }
        };

        Ok(response.status().is_success())
    }
}
