//! User directory
//!
//! Holds the authorization record of each user. Authentication happens
//! upstream; the directory only answers "what role and custom permissions
//! does this user id carry".

use assetdesk_authz::{PermissionSet, UserPermissions};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised by user directories
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No user with this id
    #[error("User not found: {0}")]
    NotFound(String),

    /// The requested change would leave the record inconsistent
    #[error("Invalid update: {0}")]
    Invalid(String),

    /// Backend failure
    #[error("Directory error: {0}")]
    General(String),
}

/// Source of per-user authorization records
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user's record
    async fn get(&self, user_id: &str) -> Result<Option<UserPermissions>, DirectoryError>;

    /// Set a user's custom permission flag.
    ///
    /// `custom_permissions` replaces the stored set when given; `None` keeps
    /// the stored set, so the flag can be toggled without losing it.
    /// Enabling the flag on a user without a set is rejected with
    /// [`DirectoryError::Invalid`].
    async fn update_permissions(
        &self,
        user_id: &str,
        use_custom_permissions: bool,
        custom_permissions: Option<PermissionSet>,
    ) -> Result<UserPermissions, DirectoryError>;

    /// Every record, sorted by user id
    async fn list(&self) -> Result<Vec<UserPermissions>, DirectoryError>;
}

/// In-memory directory seeded from configuration
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, UserPermissions>>,
}

impl MemoryUserDirectory {
    /// Directory seeded with `users`
    pub fn new(users: impl IntoIterator<Item = UserPermissions>) -> Self {
        let users = users
            .into_iter()
            .map(|user| (user.user_id.clone(), user))
            .collect();
        Self {
            users: RwLock::new(users),
        }
    }

    /// Add or replace a record
    pub async fn insert(&self, user: UserPermissions) {
        self.users.write().await.insert(user.user_id.clone(), user);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get(&self, user_id: &str) -> Result<Option<UserPermissions>, DirectoryError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn update_permissions(
        &self,
        user_id: &str,
        use_custom_permissions: bool,
        custom_permissions: Option<PermissionSet>,
    ) -> Result<UserPermissions, DirectoryError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| DirectoryError::NotFound(user_id.to_string()))?;
        let custom_permissions = custom_permissions.or_else(|| user.custom_permissions.clone());
        if use_custom_permissions && custom_permissions.is_none() {
            return Err(DirectoryError::Invalid(format!(
                "user '{}' has no custom permissions to enable",
                user_id
            )));
        }
        user.use_custom_permissions = use_custom_permissions;
        user.custom_permissions = custom_permissions;
        Ok(user.clone())
    }

    async fn list(&self) -> Result<Vec<UserPermissions>, DirectoryError> {
        let users = self.users.read().await;
        let mut list: Vec<UserPermissions> = users.values().cloned().collect();
        list.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetdesk_authz::{CapabilitySet, Resource, Role};

    #[tokio::test]
    async fn test_lookup_and_update() {
        let directory = MemoryUserDirectory::new([
            UserPermissions::new("tom", Role::Technician),
            UserPermissions::new("alice", Role::Admin),
        ]);

        assert!(directory.get("nobody").await.unwrap().is_none());
        assert_eq!(directory.get("tom").await.unwrap().unwrap().role, Role::Technician);

        let custom = PermissionSet::empty().grant(Resource::Maintenance, CapabilitySet::all());
        let updated = directory
            .update_permissions("tom", true, Some(custom.clone()))
            .await
            .unwrap();
        assert_eq!(updated.active_overrides(), Some(&custom));

        let listed = directory.list().await.unwrap();
        assert_eq!(listed[0].user_id, "alice");
    }

    #[tokio::test]
    async fn test_disabling_keeps_stored_set() {
        let custom = PermissionSet::empty().grant(Resource::Maintenance, CapabilitySet::all());
        let directory = MemoryUserDirectory::new([
            UserPermissions::new("tom", Role::Technician).with_custom_permissions(custom.clone()),
            UserPermissions::new("uma", Role::User),
        ]);

        let updated = directory.update_permissions("tom", false, None).await.unwrap();
        assert!(!updated.use_custom_permissions);
        assert_eq!(updated.custom_permissions.as_ref(), Some(&custom));
        assert!(updated.active_overrides().is_none());

        let updated = directory.update_permissions("tom", true, None).await.unwrap();
        assert_eq!(updated.active_overrides(), Some(&custom));

        let result = directory.update_permissions("uma", true, None).await;
        assert!(matches!(result, Err(DirectoryError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let directory = MemoryUserDirectory::default();
        let result = directory.update_permissions("ghost", false, None).await;
        assert!(matches!(result, Err(DirectoryError::NotFound(_))));
    }
}
