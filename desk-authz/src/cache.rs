//! Time-bounded cache in front of a [`PermissionStore`]

use crate::models::{PermissionSet, Role};
use crate::store::{PermissionStore, RoleOverride, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

struct CacheEntry {
    fetched_at: Instant,
    value: Option<PermissionSet>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<Role, CacheEntry>,
    /// Bumped on every write; a lookup that started under an older
    /// generation does not fill the cache.
    generation: u64,
}

/// Caches role override lookups per role for a fixed TTL.
///
/// Absent overrides are cached as well; storage errors never are. Writes go
/// straight to the inner store and drop the role's cached entry. A lookup
/// racing a write returns what it read but leaves the cache empty, so the
/// next lookup sees the write. Expired entries are pruned whenever a new
/// entry is stored.
pub struct CachedPermissionStore<S> {
    inner: S,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl<S: PermissionStore> CachedPermissionStore<S> {
    /// Wrap `inner`, keeping lookups for `ttl`
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop every cached entry
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.generation = state.generation.wrapping_add(1);
    }

    /// Number of roles currently held, expired or not
    pub async fn cached_entries(&self) -> usize {
        self.state.read().await.entries.len()
    }

    async fn invalidate(&self, role: &Role) {
        let mut state = self.state.write().await;
        state.entries.remove(role);
        state.generation = state.generation.wrapping_add(1);
    }
}

#[async_trait]
impl<S: PermissionStore> PermissionStore for CachedPermissionStore<S> {
    async fn get_role_override(&self, role: &Role) -> Result<Option<PermissionSet>, StoreError> {
        let generation = {
            let state = self.state.read().await;
            if let Some(entry) = state.entries.get(role) {
                if entry.fetched_at.elapsed() < self.ttl {
                    debug!("Role override cache hit for {}", role);
                    return Ok(entry.value.clone());
                }
            }
            state.generation
        };

        let value = self.inner.get_role_override(role).await?;

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!("Role overrides changed during lookup for {}, not caching", role);
            return Ok(value);
        }
        let ttl = self.ttl;
        state.entries.retain(|_, entry| entry.fetched_at.elapsed() < ttl);
        state.entries.insert(
            role.clone(),
            CacheEntry {
                fetched_at: Instant::now(),
                value: value.clone(),
            },
        );
        Ok(value)
    }

    async fn save_role_override(&self, record: RoleOverride) -> Result<(), StoreError> {
        let role = record.role.clone();
        self.inner.save_role_override(record).await?;
        self.invalidate(&role).await;
        Ok(())
    }

    async fn delete_role_override(&self, role: &Role) -> Result<bool, StoreError> {
        let removed = self.inner.delete_role_override(role).await?;
        self.invalidate(role).await;
        Ok(removed)
    }

    async fn list_role_overrides(&self) -> Result<Vec<RoleOverride>, StoreError> {
        self.inner.list_role_overrides().await
    }
}
