//! # AssetDesk Authorization
//!
//! Role-based permission resolution for the AssetDesk asset-tracking backend.
//!
//! A user's effective permissions are computed from three layers:
//!
//! - the built-in role table ([`RoleDefaults`]), supplied at startup,
//! - an administrator's persisted replacement for a role, read from a
//!   [`PermissionStore`],
//! - the user's own custom permissions, when `use_custom_permissions` is set.
//!
//! Custom permissions replace role entries one resource at a time; a resource
//! entry in the custom set fully replaces the role's entry for that resource.
//! Anything missing is denied.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use assetdesk_authz::{Action, AuthzConfig, Resource, Role, UserPermissions};
//!
//! let gate = AuthzConfig::memory().build_gate();
//! let technician = UserPermissions::new("u-42", Role::Technician);
//!
//! gate.authorize(&technician, Resource::Maintenance, Action::Create).await?;
//! ```
//!
//! The role configured as `superuser_role` bypasses every check without a
//! table lookup.

pub mod cache;
pub mod config;
pub mod defaults;
pub mod gate;
pub mod matrix;
pub mod middleware;
pub mod models;
pub mod resolver;
pub mod store;

pub use cache::CachedPermissionStore;
pub use config::{AuthzConfig, StorageConfig};
pub use defaults::RoleDefaults;
pub use gate::{AuthorizationGate, AuthzError, GateConfig, StoreFailurePolicy};
pub use matrix::{CapabilityMatrix, check};
pub use middleware::{CurrentUser, PermissionRequirement, enforce, require};
pub use models::{
    Action, CapabilitySet, PermissionEntry, PermissionError, PermissionSet, Resource, Role,
    UserPermissions,
};
pub use resolver::{DefaultsSource, PermissionResolver};
pub use store::{
    FilePermissionStore, MemoryPermissionStore, PermissionStore, RoleOverride, StoreError,
};

/// Initialize default authorization configuration
pub fn default_config() -> AuthzConfig {
    AuthzConfig::default()
}
