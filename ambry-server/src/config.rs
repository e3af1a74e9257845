use ambry_core::{AmbryError, Result, ScopingConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,
    /// Namespace used for create when the caller does not name one.
    /// Defaults to the first configured backend.
    #[serde(default)]
    pub default_namespace: Option<String>,
    #[serde(default)]
    pub scoping: ScopingSection,
    #[serde(default)]
    pub vault: Option<VaultSection>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            backends: default_backends(),
            default_namespace: None,
            scoping: ScopingSection::default(),
            vault: None,
        }
    }
}

/// Storage backend configuration, tagged by type. The namespace doubles as
/// the locator prefix for blobs stored through that backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Memory {
        #[serde(default = "default_memory_namespace")]
        namespace: String,
    },
    Ipfs {
        #[serde(default = "default_ipfs_namespace")]
        namespace: String,
        api_url: String,
        #[serde(default)]
        bearer_token: Option<String>,
    },
}

impl BackendConfig {
    pub fn namespace(&self) -> &str {
        match self {
            Self::Memory { namespace } => namespace,
            Self::Ipfs { namespace, .. } => namespace,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopingSection {
    #[serde(default = "default_true")]
    pub include_user_identity: bool,
    #[serde(default = "default_true")]
    pub include_node_identity: bool,
}

impl Default for ScopingSection {
    fn default() -> Self {
        Self {
            include_user_identity: true,
            include_node_identity: true,
        }
    }
}

impl ScopingSection {
    pub fn to_scoping(&self) -> ScopingConfig {
        ScopingConfig {
            include_user_identity: self.include_user_identity,
            include_node_identity: self.include_node_identity,
        }
    }
}

/// At-rest encryption configuration. The master key is 32 bytes of hex,
/// either inline or named via an environment variable; configuring neither
/// is an error so encryption is never silently disabled by a typo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSection {
    #[serde(default)]
    pub master_key_hex: Option<String>,
    #[serde(default)]
    pub master_key_env: Option<String>,
    #[serde(default)]
    pub key_id: Option<String>,
}

impl VaultSection {
    pub fn resolve_master_key(&self) -> Result<String> {
        if let Some(hex_key) = &self.master_key_hex {
            return Ok(hex_key.clone());
        }
        if let Some(var) = &self.master_key_env {
            return std::env::var(var).map_err(|_| {
                AmbryError::Config(format!(
                    "vault master key environment variable '{var}' is not set"
                ))
            });
        }
        Err(AmbryError::Config(
            "vault requires master_key_hex or master_key_env".to_string(),
        ))
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_backends() -> Vec<BackendConfig> {
    vec![BackendConfig::Memory {
        namespace: default_memory_namespace(),
    }]
}

fn default_memory_namespace() -> String {
    "memory".to_string()
}

fn default_ipfs_namespace() -> String {
    "ipfs".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("AMBRY"))
            .build()
            .map_err(|e| AmbryError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| AmbryError::Config(e.to_string()))?;

        Ok(config)
    }
}
