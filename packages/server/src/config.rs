//! Server configuration, read from `xcap.config.json`

use crate::authz::{AllowAll, Authorizer, OwnerPolicy};
use crate::dispatcher::DispatcherConfig;
use crate::store::{FileStore, MemoryStore, Store};
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xcap_appusage::Registry;

pub const DEFAULT_CONFIG_NAME: &str = "xcap.config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Socket address the HTTP server binds
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path prefix of the XCAP root
    #[serde(default = "default_root")]
    pub root: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub authorization: AuthorizationConfig,

    /// Per-usage overrides, keyed by auid
    #[serde(default)]
    pub usages: BTreeMap<String, UsageConfig>,
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_root() -> String {
    "/xcap-root".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StorageConfig {
    #[default]
    Memory,
    File { directory: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Policy {
    #[default]
    Owner,
    AllowAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationConfig {
    #[serde(default)]
    pub policy: Policy,

    /// Header in which the authenticating proxy asserts the requester
    #[serde(default = "default_identity_header")]
    pub identity_header: String,

    /// Usages whose documents anyone may read
    #[serde(default = "default_public_get_auids")]
    pub public_get_auids: Vec<String>,
}

fn default_identity_header() -> String {
    "x-xcap-asserted-identity".to_string()
}

fn default_public_get_auids() -> Vec<String> {
    vec!["xcap-caps".to_string()]
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            identity_header: default_identity_header(),
            public_get_auids: default_public_get_auids(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_create: Option<bool>,
}

impl Config {
    /// Load config from a directory, falling back to defaults when the
    /// directory has no config file
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            Self::from_file(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Built-in usages with the configured overrides applied
    pub fn registry(&self) -> anyhow::Result<Registry> {
        let mut registry = Registry::builtin();
        for (auid, usage) in &self.usages {
            if let Some(auto_create) = usage.auto_create {
                if !registry.set_auto_create(auid, auto_create) {
                    anyhow::bail!("Unknown application usage in configuration: {}", auid);
                }
            } else if registry.get(auid).is_none() {
                anyhow::bail!("Unknown application usage in configuration: {}", auid);
            }
        }
        Ok(registry)
    }

    pub fn store(&self) -> Arc<dyn Store> {
        match &self.storage {
            StorageConfig::Memory => Arc::new(MemoryStore::new()),
            StorageConfig::File { directory } => Arc::new(FileStore::new(directory.clone())),
        }
    }

    pub fn authorizer(&self) -> Arc<dyn Authorizer> {
        match self.authorization.policy {
            Policy::Owner => Arc::new(
                self.authorization
                    .public_get_auids
                    .iter()
                    .fold(OwnerPolicy::new(), |policy, auid| policy.with_public_get(auid.as_str())),
            ),
            Policy::AllowAll => Arc::new(AllowAll),
        }
    }

    pub fn dispatcher_config(&self) -> anyhow::Result<DispatcherConfig> {
        Ok(DispatcherConfig {
            registry: Arc::new(self.registry()?),
            store: self.store(),
            authorizer: self.authorizer(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            root: default_root(),
            storage: StorageConfig::default(),
            authorization: AuthorizationConfig::default(),
            usages: BTreeMap::new(),
        }
    }
}
