//! Built-in role permission table
//!
//! [`RoleDefaults`] is built once at startup (either [`RoleDefaults::builtin`]
//! or the `[roles]` table of the configuration file) and handed to the
//! resolver. Administrators can shadow any entry through the permission
//! store; the table itself never changes at runtime.

use crate::models::{Action, CapabilitySet, PermissionSet, Resource, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static mapping from role to its default permission set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleDefaults {
    roles: BTreeMap<Role, PermissionSet>,
}

impl RoleDefaults {
    /// An empty table: every role resolves to no access
    pub fn empty() -> Self {
        Self::default()
    }

    /// The table shipped with the application
    pub fn builtin() -> Self {
        use Action::*;

        let asset_resources = [
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
        ];

        let admin = Resource::ALL
            .iter()
            .fold(PermissionSet::empty(), |set, resource| {
                set.grant(*resource, CapabilitySet::all())
            });

        let manager = asset_resources
            .iter()
            .fold(PermissionSet::empty(), |set, resource| {
                set.grant(*resource, CapabilitySet::of(&[View, Create, Edit]))
            })
            .grant(Resource::Dashboard, CapabilitySet::read_only())
            .grant(Resource::Reports, CapabilitySet::read_only())
            .grant(Resource::Users, CapabilitySet::read_only());

        let technician = PermissionSet::empty()
            .grant(Resource::Dashboard, CapabilitySet::read_only())
            .grant(Resource::Inventory, CapabilitySet::read_only())
            .grant(Resource::Locations, CapabilitySet::read_only())
            .grant(Resource::Categories, CapabilitySet::read_only())
            .grant(Resource::Maintenance, CapabilitySet::of(&[View, Create]));

        let user = PermissionSet::empty()
            .grant(Resource::Dashboard, CapabilitySet::read_only())
            .grant(Resource::Inventory, CapabilitySet::read_only())
            .grant(Resource::Events, CapabilitySet::read_only())
            .grant(Resource::Rentals, CapabilitySet::of(&[View, Create]));

        Self::empty()
            .with_role(Role::Admin, admin)
            .with_role(Role::Manager, manager)
            .with_role(Role::Technician, technician)
            .with_role(Role::User, user)
    }

    /// Builder: set the defaults for `role`
    pub fn with_role(mut self, role: Role, permissions: PermissionSet) -> Self {
        self.roles.insert(role, permissions);
        self
    }

    /// Default set for `role`, if the table lists it
    pub fn get(&self, role: &Role) -> Option<&PermissionSet> {
        self.roles.get(role)
    }

    /// Whether the table lists `role`
    pub fn contains(&self, role: &Role) -> bool {
        self.roles.contains_key(role)
    }

    /// Listed roles in sorted order
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.keys()
    }

    /// Number of listed roles
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether no role is listed
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
