//! Authorization models
//!
//! Roles, resource tags, actions and the permission sets that bind them
//! together. Resource tags inside a [`PermissionSet`] are stored as raw
//! strings so that entries naming a tag this build does not know about are
//! kept as-is and simply never match a check.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building or parsing permission data
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    /// Two entries in one set name the same resource tag
    #[error("Duplicate resource in permission set: {0}")]
    DuplicateResource(String),

    /// Resource tag not known to this build
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// Action name outside view/create/edit/delete
    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

/// User roles
///
/// Roles outside the known set are preserved verbatim in [`Role::Other`];
/// they carry no built-in permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Identity-level bypass, never consults a permission table
    Superuser,
    /// Full administrative access
    Admin,
    /// Manages assets and the people working with them
    Manager,
    /// Handles maintenance tickets
    Technician,
    /// Regular staff member
    User,
    /// Any other role tag
    Other(String),
}

impl Role {
    /// Role tag as stored and sent over the wire
    pub fn as_str(&self) -> &str {
        match self {
            Role::Superuser => "superuser",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Technician => "technician",
            Role::User => "user",
            Role::Other(tag) => tag,
        }
    }

    /// Get a human-readable description of this role
    pub fn description(&self) -> String {
        match self {
            Role::Superuser => "Unrestricted access to every resource".to_string(),
            Role::Admin => "Full administrative access".to_string(),
            Role::Manager => "Asset and staff management".to_string(),
            Role::Technician => "Maintenance ticket handling".to_string(),
            Role::User => "Basic asset viewing and rentals".to_string(),
            Role::Other(tag) => format!("Custom role '{}'", tag),
        }
    }
}

impl From<&str> for Role {
    fn from(tag: &str) -> Self {
        match tag {
            "superuser" => Role::Superuser,
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            "technician" => Role::Technician,
            "user" => Role::User,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(tag: String) -> Self {
        Role::from(tag.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protected resource categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Landing dashboard and summary widgets
    Dashboard,
    /// Company branches
    Branches,
    /// Departments within a branch
    Departments,
    /// Physical storage locations
    Locations,
    /// Asset categories
    Categories,
    /// Asset records
    Inventory,
    /// Maintenance tickets
    Maintenance,
    /// Asset transfers between locations
    Transfers,
    /// Asset disposals
    Disposals,
    /// Asset rentals
    Rentals,
    /// Events that assets are booked for
    Events,
    /// Reports and exports
    Reports,
    /// User accounts and their permissions
    Users,
    /// Role permission administration
    Roles,
    /// Application settings
    Settings,
}

impl Resource {
    /// Every resource tag known to this build
    pub const ALL: [Resource; 15] = [
        Resource::Dashboard,
        Resource::Branches,
        Resource::Departments,
        Resource::Locations,
        Resource::Categories,
        Resource::Inventory,
        Resource::Maintenance,
        Resource::Transfers,
        Resource::Disposals,
        Resource::Rentals,
        Resource::Events,
        Resource::Reports,
        Resource::Users,
        Resource::Roles,
        Resource::Settings,
    ];

    /// Resource tag as used in permission sets
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Dashboard => "dashboard",
            Resource::Branches => "branches",
            Resource::Departments => "departments",
            Resource::Locations => "locations",
            Resource::Categories => "categories",
            Resource::Inventory => "inventory",
            Resource::Maintenance => "maintenance",
            Resource::Transfers => "transfers",
            Resource::Disposals => "disposals",
            Resource::Rentals => "rentals",
            Resource::Events => "events",
            Resource::Reports => "reports",
            Resource::Users => "users",
            Resource::Roles => "roles",
            Resource::Settings => "settings",
        }
    }
}

impl FromStr for Resource {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .iter()
            .find(|resource| resource.as_str() == s)
            .copied()
            .ok_or_else(|| PermissionError::UnknownResource(s.to_string()))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action kinds that can be granted on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Read access
    View,
    /// Create new records
    Create,
    /// Modify existing records
    Edit,
    /// Remove records
    Delete,
}

impl Action {
    /// Every action, in display order
    pub const ALL: [Action; 4] = [Action::View, Action::Create, Action::Edit, Action::Delete];

    /// Lowercase action name
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

impl FromStr for Action {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Action::View),
            "create" => Ok(Action::Create),
            "edit" => Ok(Action::Edit),
            "delete" => Ok(Action::Delete),
            _ => Err(PermissionError::UnknownAction(s.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Granted/denied flag for each action on one resource
///
/// Fields left out of a serialized document are denied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitySet {
    /// May read the resource
    pub view: bool,
    /// May create records of the resource
    pub create: bool,
    /// May modify records of the resource
    pub edit: bool,
    /// May remove records of the resource
    pub delete: bool,
}

impl CapabilitySet {
    /// Every action granted
    pub fn all() -> Self {
        Self {
            view: true,
            create: true,
            edit: true,
            delete: true,
        }
    }

    /// Nothing granted
    pub fn none() -> Self {
        Self::default()
    }

    /// View only
    pub fn read_only() -> Self {
        Self {
            view: true,
            ..Self::default()
        }
    }

    /// Build a set granting exactly the listed actions
    pub fn of(actions: &[Action]) -> Self {
        actions.iter().fold(Self::none(), |set, action| set.with(*action))
    }

    /// Return a copy with `action` granted
    pub fn with(mut self, action: Action) -> Self {
        match action {
            Action::View => self.view = true,
            Action::Create => self.create = true,
            Action::Edit => self.edit = true,
            Action::Delete => self.delete = true,
        }
        self
    }

    /// Whether `action` is granted
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.view,
            Action::Create => self.create,
            Action::Edit => self.edit,
            Action::Delete => self.delete,
        }
    }
}

/// One resource's capabilities within a permission set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    /// Resource tag, kept verbatim even when this build does not know it
    pub resource: String,
    /// Granted actions on the resource
    pub actions: CapabilitySet,
}

impl PermissionEntry {
    /// Entry for a known resource
    pub fn new(resource: Resource, actions: CapabilitySet) -> Self {
        Self {
            resource: resource.as_str().to_string(),
            actions,
        }
    }

    /// Entry for a raw resource tag
    pub fn raw(resource: impl Into<String>, actions: CapabilitySet) -> Self {
        Self {
            resource: resource.into(),
            actions,
        }
    }

    /// The known resource this entry refers to, if any
    pub fn known_resource(&self) -> Option<Resource> {
        self.resource.parse().ok()
    }
}

/// Ordered collection of permission entries with unique resource tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PermissionEntry>", into = "Vec<PermissionEntry>")]
pub struct PermissionSet {
    entries: Vec<PermissionEntry>,
}

impl PermissionSet {
    /// Create a permission set, rejecting duplicate resource tags
    pub fn new(entries: Vec<PermissionEntry>) -> Result<Self, PermissionError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.resource.as_str()) {
                return Err(PermissionError::DuplicateResource(entry.resource.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// A set without entries
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder: grant `actions` on `resource`, replacing any existing entry
    pub fn grant(mut self, resource: Resource, actions: CapabilitySet) -> Self {
        let tag = resource.as_str();
        match self.entries.iter_mut().find(|entry| entry.resource == tag) {
            Some(entry) => entry.actions = actions,
            None => self.entries.push(PermissionEntry::new(resource, actions)),
        }
        self
    }

    /// Entry for the resource tag `resource`
    pub fn get(&self, resource: &str) -> Option<&PermissionEntry> {
        self.entries.iter().find(|entry| entry.resource == resource)
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[PermissionEntry] {
        &self.entries
    }

    /// Iterate over the entries
    pub fn iter(&self) -> impl Iterator<Item = &PermissionEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<PermissionEntry>> for PermissionSet {
    type Error = PermissionError;

    fn try_from(entries: Vec<PermissionEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<PermissionSet> for Vec<PermissionEntry> {
    fn from(set: PermissionSet) -> Self {
        set.entries
    }
}

/// Authorization record attached to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissions {
    /// Identifier assigned by the upstream authenticator
    pub user_id: String,
    /// The user's role
    pub role: Role,
    /// Whether `custom_permissions` should be layered over the role defaults
    #[serde(default)]
    pub use_custom_permissions: bool,
    /// Per-user entries replacing role entries resource by resource
    #[serde(default)]
    pub custom_permissions: Option<PermissionSet>,
}

impl UserPermissions {
    /// A user relying on role defaults only
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            use_custom_permissions: false,
            custom_permissions: None,
        }
    }

    /// Attach and enable a custom permission set
    pub fn with_custom_permissions(mut self, permissions: PermissionSet) -> Self {
        self.use_custom_permissions = true;
        self.custom_permissions = Some(permissions);
        self
    }

    /// The override set to apply, if any
    pub fn active_overrides(&self) -> Option<&PermissionSet> {
        if self.use_custom_permissions {
            self.custom_permissions.as_ref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_strings() {
        assert_eq!(Role::from("technician"), Role::Technician);
        assert_eq!(Role::from("auditor"), Role::Other("auditor".to_string()));
        assert_eq!(Role::Manager.to_string(), "manager");

        let json = serde_json::to_string(&Role::Other("auditor".to_string())).unwrap();
        assert_eq!(json, "\"auditor\"");
        let parsed: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(parsed, Role::Admin);
    }

    #[test]
    fn test_resource_parsing() {
        assert_eq!("maintenance".parse::<Resource>(), Ok(Resource::Maintenance));
        assert!(matches!(
            "spaceships".parse::<Resource>(),
            Err(PermissionError::UnknownResource(_))
        ));
        for resource in Resource::ALL {
            assert_eq!(resource.as_str().parse::<Resource>(), Ok(resource));
        }
    }

    #[test]
    fn test_capability_set_missing_fields_are_denied() {
        let set: CapabilitySet = serde_json::from_str(r#"{"view": true}"#).unwrap();
        assert!(set.allows(Action::View));
        assert!(!set.allows(Action::Create));
        assert!(!set.allows(Action::Edit));
        assert!(!set.allows(Action::Delete));
    }

    #[test]
    fn test_capability_set_of() {
        let set = CapabilitySet::of(&[Action::View, Action::Edit]);
        assert!(set.view && set.edit);
        assert!(!set.create && !set.delete);
    }

    #[test]
    fn test_permission_set_rejects_duplicates() {
        let result = PermissionSet::new(vec![
            PermissionEntry::new(Resource::Inventory, CapabilitySet::read_only()),
            PermissionEntry::new(Resource::Inventory, CapabilitySet::all()),
        ]);
        assert_eq!(
            result,
            Err(PermissionError::DuplicateResource("inventory".to_string()))
        );

        let json = r#"[
            {"resource": "users", "actions": {"view": true}},
            {"resource": "users", "actions": {"edit": true}}
        ]"#;
        assert!(serde_json::from_str::<PermissionSet>(json).is_err());
    }

    #[test]
    fn test_permission_set_keeps_unknown_tags() {
        let json = r#"[{"resource": "spaceships", "actions": {"view": true}}]"#;
        let set: PermissionSet = serde_json::from_str(json).unwrap();
        let entry = set.get("spaceships").unwrap();
        assert!(entry.known_resource().is_none());
        assert!(entry.actions.view);
    }

    #[test]
    fn test_grant_replaces_existing_entry() {
        let set = PermissionSet::empty()
            .grant(Resource::Events, CapabilitySet::all())
            .grant(Resource::Events, CapabilitySet::read_only());
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("events").unwrap().actions, CapabilitySet::read_only());
    }

    #[test]
    fn test_active_overrides_requires_flag() {
        let custom = PermissionSet::empty().grant(Resource::Reports, CapabilitySet::all());
        let mut user = UserPermissions::new("u-1", Role::User);
        user.custom_permissions = Some(custom.clone());
        assert!(user.active_overrides().is_none());

        let user = user.with_custom_permissions(custom.clone());
        assert_eq!(user.active_overrides(), Some(&custom));
    }
}
