//! The authenticated caller as seen by the access-control layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::audit::ActorType;

/// Identity carried by a validated access token.
///
/// Holds everything the permission checker needs so that a check does
/// not require a database round trip for the identity itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub actor_id: Uuid,
    pub actor_type: ActorType,
    /// The tenant the identity belongs to.
    pub tenant_id: Uuid,
    pub role_id: Uuid,
}

impl Principal {
    pub fn user(user_id: Uuid, tenant_id: Uuid, role_id: Uuid) -> Self {
        Self {
            actor_id: user_id,
            actor_type: ActorType::User,
            tenant_id,
            role_id,
        }
    }
}
