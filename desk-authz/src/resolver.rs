//! Effective permission resolution
//!
//! Resolution layers three sources, lowest precedence first:
//!
//! 1. the built-in [`RoleDefaults`] table,
//! 2. an administrator's persisted replacement for the role (if the store has one),
//! 3. the user's own custom permissions, when enabled.
//!
//! Step 2 replaces the role's default set as a whole. Step 3 replaces
//! individual resource entries. Resolution never writes to the store and
//! performs at most one store read.

use crate::defaults::RoleDefaults;
use crate::matrix::CapabilityMatrix;
use crate::models::{PermissionSet, Role};
use crate::store::{PermissionStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub use crate::matrix::check;

/// Where a role's default permissions came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultsSource {
    /// Administratively edited set from the permission store
    Persisted,
    /// Built-in table entry
    Builtin,
    /// Role is unknown to both; resolves to no access
    None,
}

/// Computes capability matrices from role defaults and user overrides
#[derive(Clone)]
pub struct PermissionResolver {
    defaults: Arc<RoleDefaults>,
    store: Option<Arc<dyn PermissionStore>>,
}

impl PermissionResolver {
    /// Resolver over `defaults`, consulting `store` for persisted role edits
    pub fn new(defaults: Arc<RoleDefaults>, store: Option<Arc<dyn PermissionStore>>) -> Self {
        Self { defaults, store }
    }

    /// Resolver over the built-in table only
    pub fn static_only(defaults: Arc<RoleDefaults>) -> Self {
        Self::new(defaults, None)
    }

    /// The built-in role table
    pub fn defaults(&self) -> &RoleDefaults {
        &self.defaults
    }

    /// The permission store, when one is configured
    pub fn store(&self) -> Option<&Arc<dyn PermissionStore>> {
        self.store.as_ref()
    }

    /// Look up the default permission set for `role`.
    ///
    /// A persisted override wins over the built-in entry. A role with neither
    /// resolves to an empty set.
    pub async fn role_defaults(
        &self,
        role: &Role,
    ) -> Result<(PermissionSet, DefaultsSource), StoreError> {
        if let Some(store) = &self.store {
            if let Some(persisted) = store.get_role_override(role).await? {
                return Ok((persisted, DefaultsSource::Persisted));
            }
        }
        Ok(self.static_role_defaults(role))
    }

    fn static_role_defaults(&self, role: &Role) -> (PermissionSet, DefaultsSource) {
        match self.defaults.get(role) {
            Some(set) => (set.clone(), DefaultsSource::Builtin),
            None => (PermissionSet::empty(), DefaultsSource::None),
        }
    }

    /// Resolve the effective matrix for `role`, optionally layering `overrides`.
    ///
    /// `overrides` is ignored unless `use_overrides` is set.
    pub async fn resolve(
        &self,
        role: &Role,
        use_overrides: bool,
        overrides: Option<&PermissionSet>,
    ) -> Result<CapabilityMatrix, StoreError> {
        let (defaults, source) = self.role_defaults(role).await?;
        debug!("Resolving permissions for role {} from {:?} defaults", role, source);
        Ok(layer(&defaults, use_overrides, overrides))
    }

    /// Resolve using the built-in table only, without touching the store
    pub fn resolve_static(
        &self,
        role: &Role,
        use_overrides: bool,
        overrides: Option<&PermissionSet>,
    ) -> CapabilityMatrix {
        let (defaults, _) = self.static_role_defaults(role);
        layer(&defaults, use_overrides, overrides)
    }
}

fn layer(
    defaults: &PermissionSet,
    use_overrides: bool,
    overrides: Option<&PermissionSet>,
) -> CapabilityMatrix {
    let mut matrix = CapabilityMatrix::from_set(defaults);
    if use_overrides {
        if let Some(overrides) = overrides {
            matrix.apply_overrides(overrides);
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, CapabilitySet, PermissionEntry, Resource};
    use crate::store::{MemoryPermissionStore, RoleOverride};
    use proptest::prelude::*;

    fn scenario_defaults() -> RoleDefaults {
        RoleDefaults::empty()
            .with_role(
                Role::Technician,
                PermissionSet::empty().grant(
                    Resource::Maintenance,
                    CapabilitySet::of(&[Action::View, Action::Create]),
                ),
            )
            .with_role(
                Role::User,
                PermissionSet::empty().grant(Resource::Inventory, CapabilitySet::read_only()),
            )
    }

    fn resolver() -> PermissionResolver {
        PermissionResolver::static_only(Arc::new(scenario_defaults()))
    }

    #[tokio::test]
    async fn test_technician_override_grants_edit() {
        let overrides = PermissionSet::empty().grant(
            Resource::Maintenance,
            CapabilitySet::of(&[Action::View, Action::Create, Action::Edit]),
        );
        let matrix = resolver()
            .resolve(&Role::Technician, true, Some(&overrides))
            .await
            .unwrap();

        assert!(matrix.entry("maintenance").unwrap().edit);
        assert!(check(&matrix, "maintenance", Action::Edit));
        assert!(!check(&matrix, "maintenance", Action::Delete));
    }

    #[tokio::test]
    async fn test_user_without_roles_entry_is_denied() {
        let matrix = resolver().resolve(&Role::User, false, None).await.unwrap();
        assert!(!check(&matrix, "roles", Action::View));
    }

    #[tokio::test]
    async fn test_overrides_ignored_when_disabled() {
        let overrides = PermissionSet::empty().grant(Resource::Roles, CapabilitySet::all());
        let matrix = resolver()
            .resolve(&Role::User, false, Some(&overrides))
            .await
            .unwrap();
        assert!(matrix.entry("roles").is_none());
    }

    #[tokio::test]
    async fn test_unknown_role_resolves_empty() {
        let role = Role::Other("ghost".to_string());
        let matrix = resolver().resolve(&role, false, None).await.unwrap();
        assert!(matrix.is_empty());

        let (_, source) = resolver().role_defaults(&role).await.unwrap();
        assert_eq!(source, DefaultsSource::None);
    }

    #[tokio::test]
    async fn test_persisted_override_takes_precedence() {
        let store: Arc<dyn PermissionStore> = Arc::new(MemoryPermissionStore::new());
        let persisted = PermissionSet::empty().grant(Resource::Reports, CapabilitySet::read_only());
        store
            .save_role_override(RoleOverride::new(Role::User, persisted.clone(), None))
            .await
            .unwrap();

        let resolver = PermissionResolver::new(Arc::new(scenario_defaults()), Some(store));
        let (set, source) = resolver.role_defaults(&Role::User).await.unwrap();
        assert_eq!(source, DefaultsSource::Persisted);
        assert_eq!(set, persisted);

        let matrix = resolver.resolve(&Role::User, false, None).await.unwrap();
        assert!(matrix.allows("reports", Action::View));
        // The persisted set replaces the built-in one, it is not merged with it.
        assert!(!matrix.allows("inventory", Action::View));

        // Other roles still fall back to the table.
        let (_, source) = resolver.role_defaults(&Role::Technician).await.unwrap();
        assert_eq!(source, DefaultsSource::Builtin);
    }

    #[tokio::test]
    async fn test_persisted_override_for_unlisted_role() {
        let store: Arc<dyn PermissionStore> = Arc::new(MemoryPermissionStore::new());
        let auditor = Role::Other("auditor".to_string());
        store
            .save_role_override(RoleOverride::new(
                auditor.clone(),
                PermissionSet::empty().grant(Resource::Reports, CapabilitySet::read_only()),
                None,
            ))
            .await
            .unwrap();

        let resolver = PermissionResolver::new(Arc::new(scenario_defaults()), Some(store));
        let matrix = resolver.resolve(&auditor, false, None).await.unwrap();
        assert!(matrix.allows("reports", Action::View));
    }

    #[test]
    fn test_resolve_static_ignores_store() {
        let matrix = resolver().resolve_static(&Role::Technician, false, None);
        assert!(matrix.allows("maintenance", Action::Create));
    }

    #[tokio::test]
    async fn test_inert_unknown_override_tag() {
        let overrides = PermissionSet::new(vec![PermissionEntry::raw(
            "spaceships",
            CapabilitySet::all(),
        )])
        .unwrap();
        let matrix = resolver()
            .resolve(&Role::User, true, Some(&overrides))
            .await
            .unwrap();
        for resource in Resource::ALL {
            if resource != Resource::Inventory {
                assert!(!matrix.allows(resource.as_str(), Action::View));
            }
        }
    }

    fn capability_strategy() -> impl Strategy<Value = CapabilitySet> {
        (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
            |(view, create, edit, delete)| CapabilitySet {
                view,
                create,
                edit,
                delete,
            },
        )
    }

    fn permission_set_strategy() -> impl Strategy<Value = PermissionSet> {
        proptest::collection::btree_map(
            proptest::sample::select(Resource::ALL.to_vec()),
            capability_strategy(),
            0..Resource::ALL.len(),
        )
        .prop_map(|entries| {
            entries
                .into_iter()
                .fold(PermissionSet::empty(), |set, (resource, actions)| {
                    set.grant(resource, actions)
                })
        })
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    proptest! {
        #[test]
        fn prop_no_overrides_yields_static_defaults(defaults in permission_set_strategy()) {
            let resolver = PermissionResolver::static_only(Arc::new(
                RoleDefaults::empty().with_role(Role::Manager, defaults.clone()),
            ));
            let matrix = block_on(resolver.resolve(&Role::Manager, false, None)).unwrap();
            prop_assert_eq!(matrix, CapabilityMatrix::from_set(&defaults));
        }

        #[test]
        fn prop_overrides_replace_and_preserve(
            defaults in permission_set_strategy(),
            overrides in permission_set_strategy(),
        ) {
            let resolver = PermissionResolver::static_only(Arc::new(
                RoleDefaults::empty().with_role(Role::Manager, defaults.clone()),
            ));
            let matrix = block_on(resolver.resolve(&Role::Manager, true, Some(&overrides))).unwrap();

            for entry in overrides.iter() {
                prop_assert_eq!(matrix.entry(&entry.resource), Some(&entry.actions));
            }
            for entry in defaults.iter() {
                if overrides.get(&entry.resource).is_none() {
                    prop_assert_eq!(matrix.entry(&entry.resource), Some(&entry.actions));
                }
            }
        }

        #[test]
        fn prop_resolve_is_idempotent(
            defaults in permission_set_strategy(),
            overrides in permission_set_strategy(),
            use_overrides in any::<bool>(),
        ) {
            let resolver = PermissionResolver::static_only(Arc::new(
                RoleDefaults::empty().with_role(Role::Technician, defaults),
            ));
            let first = block_on(resolver.resolve(&Role::Technician, use_overrides, Some(&overrides))).unwrap();
            let second = block_on(resolver.resolve(&Role::Technician, use_overrides, Some(&overrides))).unwrap();
            prop_assert_eq!(
                serde_json::to_vec(&first).unwrap(),
                serde_json::to_vec(&second).unwrap()
            );
            prop_assert_eq!(first, second);
        }
    }
}
