//! Storage backends for administratively edited role permissions

use crate::models::{PermissionSet, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Errors raised by permission stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be (de)serialized
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend cannot be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A persisted replacement for a role's built-in permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleOverride {
    /// Role whose built-in set is replaced
    pub role: Role,
    /// Replacement set
    pub permissions: PermissionSet,
    /// Time of the last edit
    pub updated_at: DateTime<Utc>,
    /// User id of the administrator who made the edit
    #[serde(default)]
    pub updated_by: Option<String>,
}

impl RoleOverride {
    /// Record an edit made now
    pub fn new(role: Role, permissions: PermissionSet, updated_by: Option<String>) -> Self {
        Self {
            role,
            permissions,
            updated_at: Utc::now(),
            updated_by,
        }
    }
}

/// Role permission storage
///
/// The resolver only ever calls [`PermissionStore::get_role_override`]; the
/// remaining methods back the administration endpoints.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Point lookup of the persisted permissions for `role`
    async fn get_role_override(&self, role: &Role) -> Result<Option<PermissionSet>, StoreError>;

    /// Insert or replace the override for `record.role`
    async fn save_role_override(&self, record: RoleOverride) -> Result<(), StoreError>;

    /// Remove the override for `role`, returning whether one existed
    async fn delete_role_override(&self, role: &Role) -> Result<bool, StoreError>;

    /// Every stored override
    async fn list_role_overrides(&self) -> Result<Vec<RoleOverride>, StoreError>;
}

#[async_trait]
impl<S: PermissionStore + ?Sized> PermissionStore for Arc<S> {
    async fn get_role_override(&self, role: &Role) -> Result<Option<PermissionSet>, StoreError> {
        (**self).get_role_override(role).await
    }

    async fn save_role_override(&self, record: RoleOverride) -> Result<(), StoreError> {
        (**self).save_role_override(record).await
    }

    async fn delete_role_override(&self, role: &Role) -> Result<bool, StoreError> {
        (**self).delete_role_override(role).await
    }

    async fn list_role_overrides(&self) -> Result<Vec<RoleOverride>, StoreError> {
        (**self).list_role_overrides().await
    }
}

/// In-memory storage, for tests and single-process deployments
#[derive(Default)]
pub struct MemoryPermissionStore {
    overrides: RwLock<BTreeMap<Role, RoleOverride>>,
}

impl MemoryPermissionStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn get_role_override(&self, role: &Role) -> Result<Option<PermissionSet>, StoreError> {
        let overrides = self.overrides.read().await;
        Ok(overrides.get(role).map(|record| record.permissions.clone()))
    }

    async fn save_role_override(&self, record: RoleOverride) -> Result<(), StoreError> {
        let mut overrides = self.overrides.write().await;
        overrides.insert(record.role.clone(), record);
        Ok(())
    }

    async fn delete_role_override(&self, role: &Role) -> Result<bool, StoreError> {
        let mut overrides = self.overrides.write().await;
        Ok(overrides.remove(role).is_some())
    }

    async fn list_role_overrides(&self) -> Result<Vec<RoleOverride>, StoreError> {
        let overrides = self.overrides.read().await;
        Ok(overrides.values().cloned().collect())
    }
}

/// JSON file storage
///
/// The whole document is read on every lookup so edits made by another
/// process are picked up. Writes go to a temporary file that is renamed over
/// the original.
pub struct FilePermissionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePermissionStore {
    /// Store backed by the JSON document at `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the JSON document
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<RoleOverride>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, records: &[RoleOverride]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(records)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        debug!("Wrote {} role overrides to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for FilePermissionStore {
    async fn get_role_override(&self, role: &Role) -> Result<Option<PermissionSet>, StoreError> {
        let records = self.read_all().await?;
        Ok(records
            .into_iter()
            .find(|record| &record.role == role)
            .map(|record| record.permissions))
    }

    async fn save_role_override(&self, record: RoleOverride) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        match records.iter_mut().find(|existing| existing.role == record.role) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.write_all(&records).await
    }

    async fn delete_role_override(&self, role: &Role) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        let before = records.len();
        records.retain(|record| &record.role != role);
        if records.len() == before {
            return Ok(false);
        }
        self.write_all(&records).await?;
        Ok(true)
    }

    async fn list_role_overrides(&self) -> Result<Vec<RoleOverride>, StoreError> {
        self.read_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CapabilitySet, Resource};

    fn technician_override() -> RoleOverride {
        RoleOverride::new(
            Role::Technician,
            PermissionSet::empty().grant(Resource::Maintenance, CapabilitySet::all()),
            Some("admin-1".to_string()),
        )
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryPermissionStore::new();
        assert!(store.get_role_override(&Role::Technician).await.unwrap().is_none());

        store.save_role_override(technician_override()).await.unwrap();
        let stored = store.get_role_override(&Role::Technician).await.unwrap().unwrap();
        assert_eq!(stored.get("maintenance").unwrap().actions, CapabilitySet::all());

        assert!(store.delete_role_override(&Role::Technician).await.unwrap());
        assert!(!store.delete_role_override(&Role::Technician).await.unwrap());
        assert!(store.list_role_overrides().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePermissionStore::new(dir.path().join("roles.json"));
        assert!(store.get_role_override(&Role::Admin).await.unwrap().is_none());
        assert!(store.list_role_overrides().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("roles.json");

        let store = FilePermissionStore::new(&path);
        store.save_role_override(technician_override()).await.unwrap();

        let reopened = FilePermissionStore::new(&path);
        let records = reopened.list_role_overrides().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].updated_by.as_deref(), Some("admin-1"));

        assert!(reopened.delete_role_override(&Role::Technician).await.unwrap());
        assert!(store.get_role_override(&Role::Technician).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_replaces_existing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePermissionStore::new(dir.path().join("roles.json"));
        store.save_role_override(technician_override()).await.unwrap();
        store
            .save_role_override(RoleOverride::new(
                Role::Technician,
                PermissionSet::empty(),
                None,
            ))
            .await
            .unwrap();

        let records = store.list_role_overrides().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].permissions.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roles.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = FilePermissionStore::new(&path);
        let result = store.get_role_override(&Role::Admin).await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
