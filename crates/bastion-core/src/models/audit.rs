//! Audit log domain model.
//!
//! Audit entries are immutable once written. The store offers no update
//! or delete path for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    User,
    ServiceAccount,
    System,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::User => "user",
            ActorType::ServiceAccount => "service_account",
            ActorType::System => "system",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [ActorType::User, ActorType::ServiceAccount, ActorType::System]
            .into_iter()
            .find(|t| t.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    /// Rejected by the permission checker.
    Denied,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
            AuditOutcome::Denied => "denied",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [AuditOutcome::Success, AuditOutcome::Failure, AuditOutcome::Denied]
            .into_iter()
            .find(|o| o.as_str() == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub actor_type: ActorType,
    /// Action kind (e.g., `publish`).
    pub action: String,
    /// Kind of entity acted on (e.g., `article`).
    pub target_type: String,
    pub target_id: Option<String>,
    pub outcome: AuditOutcome,
    /// Snapshot of the target before the mutation.
    pub before: Option<serde_json::Value>,
    /// Snapshot of the target after the mutation.
    pub after: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Fields supplied by the caller when appending an entry. The store
/// assigns the id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub actor_type: ActorType,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub outcome: AuditOutcome,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}
