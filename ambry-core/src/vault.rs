use crate::error::{AmbryError, Result};
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Nonce size for AES-GCM (96 bits).
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits).
const KEY_SIZE: usize = 32;

/// The authenticated-encryption scheme, fixed for a whole deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionType {
    Aes256Gcm,
}

impl EncryptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "AES-256-GCM",
        }
    }
}

/// External encryption capability consumed by the orchestrator.
///
/// Key references are opaque to the vault caller; the gate derives them per
/// call from the node identity, so key material is never cached in process
/// state on this side of the boundary.
#[async_trait]
pub trait VaultConnector: Send + Sync {
    async fn encrypt(
        &self,
        key_ref: &str,
        encryption_type: EncryptionType,
        data: &[u8],
    ) -> Result<Vec<u8>>;

    async fn decrypt(
        &self,
        key_ref: &str,
        encryption_type: EncryptionType,
        data: &[u8],
    ) -> Result<Vec<u8>>;
}

/// Wraps the payload path with at-rest encryption when configured.
///
/// Absence of the gate is the disabled state; the orchestrator holds an
/// `Option<EncryptionGate>` and passes bytes through untouched when it is
/// `None`.
#[derive(Clone)]
pub struct EncryptionGate {
    vault: Arc<dyn VaultConnector>,
    key_id: String,
}

impl EncryptionGate {
    pub fn new(vault: Arc<dyn VaultConnector>, key_id: impl Into<String>) -> Self {
        Self {
            vault,
            key_id: key_id.into(),
        }
    }

    fn key_ref(&self, node_identity: &str) -> String {
        format!("{}/{}", node_identity, self.key_id)
    }

    pub async fn protect(&self, node_identity: &str, data: &[u8]) -> Result<Vec<u8>> {
        self.vault
            .encrypt(
                &self.key_ref(node_identity),
                EncryptionType::Aes256Gcm,
                data,
            )
            .await
    }

    pub async fn reveal(&self, node_identity: &str, data: &[u8]) -> Result<Vec<u8>> {
        self.vault
            .decrypt(
                &self.key_ref(node_identity),
                EncryptionType::Aes256Gcm,
                data,
            )
            .await
    }
}

/// In-process vault deriving a per-key-ref subkey from a single master key.
///
/// Ciphertext layout: `[nonce: 12 bytes][ciphertext + tag]` with a fresh
/// random nonce per encryption. Suitable for tests and single-node
/// deployments; production setups plug in a real vault behind the
/// [`VaultConnector`] trait.
pub struct MemoryVaultConnector {
    master_key: [u8; KEY_SIZE],
}

impl fmt::Debug for MemoryVaultConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryVaultConnector")
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}

impl MemoryVaultConnector {
    pub fn from_key(master_key: [u8; KEY_SIZE]) -> Self {
        Self { master_key }
    }

    /// Create from a 64-character hex string.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key)
            .map_err(|error| AmbryError::Encryption(format!("invalid hex key: {error}")))?;
        if bytes.len() != KEY_SIZE {
            return Err(AmbryError::Encryption(format!(
                "master key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }
        let mut master_key = [0u8; KEY_SIZE];
        master_key.copy_from_slice(&bytes);
        Ok(Self { master_key })
    }

    /// Generate a random master key.
    pub fn generate() -> Self {
        use aes_gcm::aead::rand_core::RngCore;

        let mut master_key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut master_key);
        Self { master_key }
    }

    fn derive_key(&self, key_ref: &str) -> [u8; KEY_SIZE] {
        let mut hasher = Sha256::new();
        hasher.update(self.master_key);
        hasher.update(key_ref.as_bytes());
        hasher.finalize().into()
    }

    fn cipher(&self, key_ref: &str) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.derive_key(key_ref))
            .map_err(|error| AmbryError::Encryption(format!("failed to initialize cipher: {error}")))
    }
}

#[async_trait]
impl VaultConnector for MemoryVaultConnector {
    async fn encrypt(
        &self,
        key_ref: &str,
        encryption_type: EncryptionType,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        use aes_gcm::aead::rand_core::RngCore;

        let EncryptionType::Aes256Gcm = encryption_type;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher(key_ref)?
            .encrypt(nonce, data)
            .map_err(|error| AmbryError::Encryption(format!("encryption failed: {error}")))?;

        let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    async fn decrypt(
        &self,
        key_ref: &str,
        encryption_type: EncryptionType,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        let EncryptionType::Aes256Gcm = encryption_type;

        if data.len() < NONCE_SIZE {
            return Err(AmbryError::Encryption(
                "data too short to be encrypted".to_string(),
            ));
        }

        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
        self.cipher(key_ref)?
            .decrypt(nonce, &data[NONCE_SIZE..])
            .map_err(|_| {
                AmbryError::Encryption("decryption failed (wrong key or corrupted data)".to_string())
            })
    }
}
