//! In-process role catalog.
//!
//! All roles are loaded once into an immutable snapshot. Readers clone
//! the `Arc` and work lock-free from then on; [`RoleCatalog::refresh`]
//! builds a new snapshot and swaps it in.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::role::Role;
use bastion_core::repository::RoleRepository;
use tracing::info;
use uuid::Uuid;

/// Immutable view of every role at load time.
#[derive(Debug, Default)]
pub struct RoleSnapshot {
    roles: HashMap<Uuid, Role>,
}

impl RoleSnapshot {
    pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Role> {
        self.roles.get(&id)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

pub struct RoleCatalog<R: RoleRepository> {
    roles: R,
    snapshot: RwLock<Arc<RoleSnapshot>>,
}

impl<R: RoleRepository> RoleCatalog<R> {
    /// Load every role and build the first snapshot.
    pub async fn load(roles: R) -> BastionResult<Self> {
        let snapshot = Self::fetch(&roles).await?;
        Ok(Self {
            roles,
            snapshot: RwLock::new(snapshot),
        })
    }

    /// Current snapshot. Cheap; hold it for the length of one request.
    pub fn snapshot(&self) -> BastionResult<Arc<RoleSnapshot>> {
        self.snapshot
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| BastionError::Internal("role catalog lock poisoned".into()))
    }

    /// Re-fetch all roles and replace the snapshot. Call after any role
    /// change.
    pub async fn refresh(&self) -> BastionResult<()> {
        let fresh = Self::fetch(&self.roles).await?;
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| BastionError::Internal("role catalog lock poisoned".into()))?;
        *guard = fresh;
        Ok(())
    }

    async fn fetch(roles: &R) -> BastionResult<Arc<RoleSnapshot>> {
        let snapshot = RoleSnapshot::from_roles(roles.list_all().await?);
        info!(roles = snapshot.len(), "Role catalog loaded");
        Ok(Arc::new(snapshot))
    }
}
