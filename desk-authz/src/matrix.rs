//! Resolved capability matrix
//!
//! A [`CapabilityMatrix`] is what a single authorization decision is made
//! against. Entries are keyed by resource tag and kept sorted, so two
//! resolutions of the same inputs compare and serialize identically.

use crate::models::{Action, CapabilitySet, PermissionEntry, PermissionSet, Resource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Effective per-resource capabilities for one subject
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityMatrix {
    entries: BTreeMap<String, CapabilitySet>,
}

impl CapabilityMatrix {
    /// An empty matrix; every check against it is denied
    pub fn empty() -> Self {
        Self::default()
    }

    /// Matrix granting every action on every known resource
    pub fn full() -> Self {
        let entries = Resource::ALL
            .iter()
            .map(|resource| (resource.as_str().to_string(), CapabilitySet::all()))
            .collect();
        Self { entries }
    }

    /// Matrix holding exactly the entries of `set`
    pub fn from_set(set: &PermissionSet) -> Self {
        let entries = set
            .iter()
            .map(|entry| (entry.resource.clone(), entry.actions))
            .collect();
        Self { entries }
    }

    /// Layer `overrides` on top of this matrix.
    ///
    /// Each override entry replaces the whole entry for its resource; booleans
    /// are never merged field by field. Resources only present in `overrides`
    /// are added.
    pub fn apply_overrides(&mut self, overrides: &PermissionSet) {
        for entry in overrides.iter() {
            self.entries.insert(entry.resource.clone(), entry.actions);
        }
    }

    /// Capabilities for a resource tag
    pub fn entry(&self, resource: &str) -> Option<&CapabilitySet> {
        self.entries.get(resource)
    }

    /// Method form of [`check`]
    pub fn allows(&self, resource: &str, action: Action) -> bool {
        check(self, resource, action)
    }

    /// Resource tags with an entry, sorted
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the matrix has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert back into a permission set, in resource tag order
    pub fn to_permission_set(&self) -> PermissionSet {
        let entries = self
            .entries
            .iter()
            .map(|(resource, actions)| PermissionEntry::raw(resource.clone(), *actions))
            .collect();
        // Keys of a map are unique, so this cannot fail.
        PermissionSet::new(entries).unwrap_or_default()
    }
}

/// Whether `matrix` grants `action` on `resource`.
///
/// Resources without an entry are denied for every action.
pub fn check(matrix: &CapabilityMatrix, resource: &str, action: Action) -> bool {
    matrix
        .entry(resource)
        .is_some_and(|capabilities| capabilities.allows(action))
}
