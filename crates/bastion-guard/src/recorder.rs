//! Audit recording.
//!
//! Thin layer over an [`AuditLogWriter`] that builds entries from the
//! gate's context. A standalone entry that cannot be stored is
//! [`BastionError::AuditWrite`]; a guarded commit keeps the writer's
//! classification, so a conflicting staged write stays `AlreadyExists`.

use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::audit::{AuditLogEntry, AuditOutcome, CreateAuditLogEntry};
use bastion_core::models::principal::Principal;
use bastion_core::repository::{AuditLogWriter, StagedWrite};
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use crate::context::ActionDescriptor;

/// Snapshots are stored as objects; anything else is wrapped.
pub fn normalise_snapshot(snapshot: Option<Value>) -> Option<Value> {
    snapshot.map(|value| match value {
        Value::Object(_) => value,
        other => serde_json::json!({ "value": other }),
    })
}

pub struct AuditRecorder<W: AuditLogWriter> {
    writer: W,
}

impl<W: AuditLogWriter> AuditRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn entry(
        principal: &Principal,
        tenant_id: Uuid,
        action: ActionDescriptor,
        outcome: AuditOutcome,
        ip_address: Option<String>,
    ) -> CreateAuditLogEntry {
        CreateAuditLogEntry {
            tenant_id,
            actor_id: principal.actor_id,
            actor_type: principal.actor_type,
            action: action.kind,
            target_type: action.target_type,
            target_id: action.target_id,
            outcome,
            before: normalise_snapshot(action.before),
            after: normalise_snapshot(action.after),
            ip_address,
        }
    }

    /// Append a standalone entry and return its id.
    pub async fn record(&self, entry: CreateAuditLogEntry) -> BastionResult<Uuid> {
        let action = entry.action.clone();
        self.writer
            .append(entry)
            .await
            .map(|written| written.id)
            .map_err(|e| audit_failure(&action, e))
    }

    /// Apply `write` and append `entry` in one transaction.
    pub async fn commit(
        &self,
        write: StagedWrite,
        entry: CreateAuditLogEntry,
    ) -> BastionResult<AuditLogEntry> {
        let action = entry.action.clone();
        let result = self.writer.commit_with_audit(write, entry).await;
        if let Err(BastionError::AuditWrite(reason)) = &result {
            error!(action, %reason, "Audit write failed");
        }
        result
    }
}

fn audit_failure(action: &str, err: BastionError) -> BastionError {
    match err {
        // Caller mistakes keep their own kind.
        BastionError::Validation { .. } | BastionError::AlreadyExists { .. } => err,
        BastionError::AuditWrite(_) => err,
        other => {
            error!(action, error = %other, "Audit write failed");
            BastionError::AuditWrite(other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_pass_through_and_scalars_are_wrapped() {
        assert_eq!(
            normalise_snapshot(Some(json!({ "title": "Hi" }))),
            Some(json!({ "title": "Hi" }))
        );
        assert_eq!(
            normalise_snapshot(Some(json!("draft"))),
            Some(json!({ "value": "draft" }))
        );
        assert_eq!(
            normalise_snapshot(Some(json!([1, 2]))),
            Some(json!({ "value": [1, 2] }))
        );
        assert_eq!(normalise_snapshot(None), None);
    }

    #[test]
    fn storage_errors_become_audit_write() {
        let err = audit_failure("publish", BastionError::Database("boom".into()));
        assert!(matches!(err, BastionError::AuditWrite(msg) if msg.contains("boom")));

        let err = audit_failure(
            "publish",
            BastionError::Validation {
                message: "reserved".into(),
            },
        );
        assert!(matches!(err, BastionError::Validation { .. }));

        let err = audit_failure(
            "publish",
            BastionError::AlreadyExists {
                entity: "article".into(),
            },
        );
        assert!(matches!(err, BastionError::AlreadyExists { entity } if entity == "article"));
    }
}
