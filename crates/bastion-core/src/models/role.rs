//! Role domain model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::capability::Capability;

/// Mapping from capability to granted (`true`) or explicitly denied (`false`).
pub type CapabilityMap = BTreeMap<Capability, bool>;

/// A named bundle of capabilities.
///
/// A role either belongs to one tenant or is global (`tenant_id` is
/// `None`) and can then be held by identities of any tenant. Superuser
/// (owner) roles grant every capability, but only inside the holder's
/// own tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    /// Owning tenant, `None` for global roles.
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub is_superuser: bool,
    pub capabilities: CapabilityMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn is_global(&self) -> bool {
        self.tenant_id.is_none()
    }

    /// Whether an identity of `tenant_id` may hold this role.
    pub fn usable_in(&self, tenant_id: Uuid) -> bool {
        self.tenant_id.is_none_or(|t| t == tenant_id)
    }

    /// Whether the capability mapping explicitly grants `capability`.
    ///
    /// Absent entries deny. Superuser status is not considered here.
    pub fn grants(&self, capability: Capability) -> bool {
        self.capabilities.get(&capability).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub is_superuser: bool,
    pub capabilities: CapabilityMap,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateRole {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_superuser: Option<bool>,
    /// Replaces the whole mapping when set.
    pub capabilities: Option<CapabilityMap>,
}
