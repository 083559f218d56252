//! Authorization configuration

use crate::cache::CachedPermissionStore;
use crate::defaults::RoleDefaults;
use crate::gate::{AuthorizationGate, GateConfig};
use crate::resolver::PermissionResolver;
use crate::store::{FilePermissionStore, MemoryPermissionStore, PermissionStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Authorization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Where administratively edited role permissions live
    pub storage: StorageConfig,
    /// Superuser role and storage failure policy
    #[serde(flatten)]
    pub gate: GateConfig,
    /// Cache role permission lookups for this many seconds (0 disables)
    pub cache_ttl_secs: u64,
    /// Role table; the built-in table is used when absent
    pub roles: Option<RoleDefaults>,
}

/// Storage configuration for role permission overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Built-in table only; role permissions cannot be edited
    None,
    /// Memory-only storage (for testing)
    Memory,
    /// JSON file storage
    File {
        /// Path to the JSON document
        path: PathBuf,
    },
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::File {
                path: dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("assetdesk")
                    .join("role-permissions.json"),
            },
            gate: GateConfig::default(),
            cache_ttl_secs: 30,
            roles: None,
        }
    }
}

impl AuthzConfig {
    /// Create a memory-only configuration (for testing)
    pub fn memory() -> Self {
        Self {
            storage: StorageConfig::Memory,
            cache_ttl_secs: 0,
            ..Default::default()
        }
    }

    /// Create a configuration without a permission store
    pub fn static_only() -> Self {
        Self {
            storage: StorageConfig::None,
            ..Default::default()
        }
    }

    /// The configured role table, or the built-in one
    pub fn role_defaults(&self) -> RoleDefaults {
        self.roles.clone().unwrap_or_else(RoleDefaults::builtin)
    }

    /// Open the configured permission store, wrapped in a cache when enabled
    pub fn open_store(&self) -> Option<Arc<dyn PermissionStore>> {
        let store: Arc<dyn PermissionStore> = match &self.storage {
            StorageConfig::None => return None,
            StorageConfig::Memory => Arc::new(MemoryPermissionStore::new()),
            StorageConfig::File { path } => Arc::new(FilePermissionStore::new(path.clone())),
        };

        if self.cache_ttl_secs == 0 {
            return Some(store);
        }
        Some(Arc::new(CachedPermissionStore::new(
            store,
            Duration::from_secs(self.cache_ttl_secs),
        )))
    }

    /// Build the gate described by this configuration
    pub fn build_gate(&self) -> AuthorizationGate {
        let defaults = self.role_defaults();
        info!(
            "Authorization: {} roles in table, storage {:?}, on store error {:?}",
            defaults.len(),
            self.storage,
            self.gate.on_store_error
        );
        let resolver = PermissionResolver::new(Arc::new(defaults), self.open_store());
        AuthorizationGate::new(resolver, self.gate.clone())
    }
}
