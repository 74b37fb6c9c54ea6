//! SurrealDB implementation of the audit log.
//!
//! The table is append-only: the schema forbids update and delete, and
//! this repository exposes neither. [`AuditLogWriter::commit_with_audit`]
//! sends the caller's staged statements and the audit insert as one
//! transaction so a failure in either discards both.

use std::collections::HashMap;

use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::audit::{ActorType, AuditLogEntry, AuditOutcome, CreateAuditLogEntry};
use bastion_core::repository::{
    AuditLogFilter, AuditLogReader, AuditLogWriter, PaginatedResult, Pagination, StagedWrite,
};
use chrono::{DateTime, Utc};
use surrealdb::method::Query;
use surrealdb::{Connection, Surreal};
use surrealdb_types::{QueryError, SurrealValue};
use tracing::{debug, warn};
use uuid::Uuid;

use super::query::{CountRow, first_row, page, total};
use crate::error::{DbError, parse_uuid, query_error, write_error};

const INSERT_AUDIT: &str = "CREATE type::record('audit_log', $audit_id) SET \
     tenant_id = $audit_tenant_id, \
     actor_id = $audit_actor_id, \
     actor_type = $audit_actor_type, \
     action = $audit_action, \
     target_type = $audit_target_type, \
     target_id = $audit_target_id, \
     outcome = $audit_outcome, \
     before = $audit_before, \
     after = $audit_after, \
     ip_address = $audit_ip_address, \
     timestamp = $audit_timestamp";

#[derive(Debug, SurrealValue)]
struct AuditRow {
    record_id: String,
    tenant_id: String,
    actor_id: String,
    actor_type: String,
    action: String,
    target_type: String,
    target_id: Option<String>,
    outcome: String,
    before: Option<serde_json::Value>,
    after: Option<serde_json::Value>,
    ip_address: Option<String>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = DbError;

    fn try_from(row: AuditRow) -> Result<Self, DbError> {
        let actor_type = ActorType::from_name(&row.actor_type)
            .ok_or_else(|| DbError::Decode(format!("unknown actor type: {}", row.actor_type)))?;
        let outcome = AuditOutcome::from_name(&row.outcome)
            .ok_or_else(|| DbError::Decode(format!("unknown audit outcome: {}", row.outcome)))?;
        Ok(AuditLogEntry {
            id: parse_uuid("audit_log", &row.record_id)?,
            tenant_id: parse_uuid("tenant", &row.tenant_id)?,
            actor_id: parse_uuid("actor", &row.actor_id)?,
            actor_type,
            action: row.action,
            target_type: row.target_type,
            target_id: row.target_id,
            outcome,
            before: row.before,
            after: row.after,
            ip_address: row.ip_address,
            timestamp: row.timestamp,
        })
    }
}

/// Builds the WHERE clause for a filtered listing. Every condition uses
/// a named binding; values never end up in the query text.
fn filter_clause(filter: &AuditLogFilter) -> String {
    let optional = [
        (filter.actor_id.is_some(), "actor_id = $actor_id"),
        (filter.action.is_some(), "action = $action"),
        (filter.target_type.is_some(), "target_type = $target_type"),
        (filter.target_id.is_some(), "target_id = $target_id"),
        (filter.outcome.is_some(), "outcome = $outcome"),
        (filter.from.is_some(), "timestamp >= $from"),
        (filter.to.is_some(), "timestamp < $to"),
    ];
    std::iter::once("tenant_id = $tenant_id")
        .chain(optional.into_iter().filter_map(|(set, cond)| set.then_some(cond)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn bind_filter<C: Connection>(mut query: Query<'_, C>, filter: AuditLogFilter) -> Query<'_, C> {
    let text = [
        ("actor_id", filter.actor_id.map(|a| a.to_string())),
        ("action", filter.action),
        ("target_type", filter.target_type),
        ("target_id", filter.target_id),
        ("outcome", filter.outcome.map(|o| o.as_str().to_string())),
    ];
    for (name, value) in text {
        if let Some(value) = value {
            query = query.bind((name, value));
        }
    }
    // Bound as datetimes so range comparisons are not done on strings.
    if let Some(from) = filter.from {
        query = query.bind(("from", from));
    }
    if let Some(to) = filter.to {
        query = query.bind(("to", to));
    }
    query
}

fn bind_entry<'a, C: Connection>(
    query: Query<'a, C>,
    id: Uuid,
    timestamp: DateTime<Utc>,
    input: &CreateAuditLogEntry,
) -> Query<'a, C> {
    query
        .bind(("audit_id", id.to_string()))
        .bind(("audit_tenant_id", input.tenant_id.to_string()))
        .bind(("audit_actor_id", input.actor_id.to_string()))
        .bind(("audit_actor_type", input.actor_type.as_str().to_string()))
        .bind(("audit_action", input.action.clone()))
        .bind(("audit_target_type", input.target_type.clone()))
        .bind(("audit_target_id", input.target_id.clone()))
        .bind(("audit_outcome", input.outcome.as_str().to_string()))
        .bind(("audit_before", input.before.clone()))
        .bind(("audit_after", input.after.clone()))
        .bind(("audit_ip_address", input.ip_address.clone()))
        .bind(("audit_timestamp", timestamp))
}

fn entry_from_input(id: Uuid, timestamp: DateTime<Utc>, input: CreateAuditLogEntry) -> AuditLogEntry {
    AuditLogEntry {
        id,
        tenant_id: input.tenant_id,
        actor_id: input.actor_id,
        actor_type: input.actor_type,
        action: input.action,
        target_type: input.target_type,
        target_id: input.target_id,
        outcome: input.outcome,
        before: input.before,
        after: input.after,
        ip_address: input.ip_address,
        timestamp,
    }
}

fn was_skipped(err: &surrealdb::Error) -> bool {
    matches!(
        err.query_details(),
        Some(QueryError::NotExecuted | QueryError::Cancelled)
    )
}

/// Name the failure of a rolled-back guarded transaction.
///
/// Statements the transaction never ran report `NotExecuted` or
/// `Cancelled`. The audit insert is the last statement before COMMIT, so
/// a cancelled statement means a staged statement failed first; the
/// staged failure then keeps its own kind and only a failing audit
/// insert is [`BastionError::AuditWrite`].
fn rollback_error(errors: HashMap<usize, surrealdb::Error>) -> BastionError {
    let mut errors: Vec<_> = errors.into_iter().collect();
    errors.sort_by_key(|(index, _)| *index);

    let staged_failed = errors
        .iter()
        .any(|(_, e)| matches!(e.query_details(), Some(QueryError::Cancelled)));
    let (failed, skipped): (Vec<_>, Vec<_>) = errors
        .into_iter()
        .map(|(_, e)| e)
        .partition(|e| !was_skipped(e));

    let Some(cause) = failed.into_iter().chain(skipped).next() else {
        return BastionError::AuditWrite("transaction rolled back".into());
    };

    if !staged_failed {
        BastionError::AuditWrite(cause.to_string())
    } else if cause.is_thrown() {
        BastionError::Validation {
            message: cause.to_string(),
        }
    } else {
        write_error(cause).into()
    }
}

#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogWriter for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> BastionResult<AuditLogEntry> {
        let id = Uuid::new_v4();
        let timestamp = Utc::now();

        bind_entry(self.db.query(INSERT_AUDIT), id, timestamp, &input)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| query_error("audit_log", e))?;

        debug!(audit_id = %id, tenant_id = %input.tenant_id, action = %input.action, "Audit entry appended");
        Ok(entry_from_input(id, timestamp, input))
    }

    async fn commit_with_audit(
        &self,
        write: StagedWrite,
        entry: CreateAuditLogEntry,
    ) -> BastionResult<AuditLogEntry> {
        if let Some(name) = write.reserved_binding() {
            return Err(BastionError::Validation {
                message: format!("binding name {name:?} is reserved"),
            });
        }

        let id = Uuid::new_v4();
        let timestamp = Utc::now();

        let statements = write.query.trim().trim_end_matches(';');
        let sql = format!(
            "BEGIN TRANSACTION;\n{statements};\n{INSERT_AUDIT};\nCOMMIT TRANSACTION;"
        );

        let mut query = self.db.query(&sql);
        for (name, value) in write.bindings {
            query = query.bind((name, value));
        }

        let mut response = bind_entry(query, id, timestamp, &entry)
            .await
            .map_err(DbError::from)?;

        let errors = response.take_errors();
        if !errors.is_empty() {
            let err = rollback_error(errors);
            warn!(
                tenant_id = %entry.tenant_id,
                action = %entry.action,
                error = %err,
                "Guarded write rolled back"
            );
            return Err(err);
        }

        debug!(audit_id = %id, tenant_id = %entry.tenant_id, action = %entry.action, "Guarded write committed");
        Ok(entry_from_input(id, timestamp, entry))
    }
}

impl<C: Connection> AuditLogReader for SurrealAuditLogRepository<C> {
    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<AuditLogEntry> {
        let mut response = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM type::record('audit_log', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuditRow> = response.take(0).map_err(DbError::from)?;
        Ok(first_row(rows, "audit_log", id)?.try_into()?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> BastionResult<PaginatedResult<AuditLogEntry>> {
        let clause = filter_clause(&filter);
        let sql = format!(
            "SELECT count() AS total FROM audit_log WHERE {clause} GROUP ALL;\n\
             SELECT meta::id(id) AS record_id, * FROM audit_log WHERE {clause} \
             ORDER BY timestamp DESC LIMIT $limit START $offset;"
        );

        let query = self
            .db
            .query(&sql)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        let mut response = bind_filter(query, filter).await.map_err(DbError::from)?;

        let counts: Vec<CountRow> = response.take(0).map_err(DbError::from)?;
        let rows: Vec<AuditRow> = response.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(AuditLogEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page(items, total(&counts), &pagination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_executed() -> surrealdb::Error {
        surrealdb::Error::query("not executed".into(), QueryError::NotExecuted)
    }

    fn cancelled() -> surrealdb::Error {
        surrealdb::Error::query("cancelled".into(), QueryError::Cancelled)
    }

    #[test]
    fn staged_throw_is_a_validation_error() {
        let errors = HashMap::from([
            (1, not_executed()),
            (2, surrealdb::Error::thrown("publishing window closed".into())),
            (3, cancelled()),
            (4, not_executed()),
        ]);
        let err = rollback_error(errors);
        assert!(
            matches!(err, BastionError::Validation { message } if message.contains("publishing window closed"))
        );
    }

    #[test]
    fn staged_duplicate_names_its_own_table() {
        let errors = HashMap::from([
            (
                1,
                surrealdb::Error::internal(
                    "Database index `idx_tenant_slug` already contains 'acme', \
                     with record `tenant:x`"
                        .into(),
                ),
            ),
            (2, cancelled()),
            (3, not_executed()),
        ]);
        let err = rollback_error(errors);
        assert!(matches!(err, BastionError::AlreadyExists { entity } if entity == "tenant"));
    }

    #[test]
    fn failing_audit_insert_is_an_audit_write_error() {
        let errors = HashMap::from([
            (1, not_executed()),
            (2, surrealdb::Error::internal("Found 'bogus' for field `outcome`".into())),
            (3, not_executed()),
        ]);
        let err = rollback_error(errors);
        assert!(matches!(err, BastionError::AuditWrite(msg) if msg.contains("outcome")));
    }

    #[test]
    fn empty_filter_scopes_to_tenant_only() {
        assert_eq!(
            filter_clause(&AuditLogFilter::default()),
            "tenant_id = $tenant_id"
        );
    }

    #[test]
    fn filter_conditions_use_bindings() {
        let filter = AuditLogFilter {
            action: Some("publish".into()),
            outcome: Some(AuditOutcome::Denied),
            ..Default::default()
        };
        let clause = filter_clause(&filter);
        assert_eq!(
            clause,
            "tenant_id = $tenant_id AND action = $action AND outcome = $outcome"
        );
        assert!(!clause.contains("publish"));
    }

    #[test]
    fn range_conditions_come_last() {
        let filter = AuditLogFilter {
            to: Some(Utc::now()),
            actor_id: Some(Uuid::nil()),
            ..Default::default()
        };
        assert_eq!(
            filter_clause(&filter),
            "tenant_id = $tenant_id AND actor_id = $actor_id AND timestamp < $to"
        );
    }

    #[test]
    fn insert_only_uses_reserved_bindings() {
        for token in INSERT_AUDIT.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$')) {
            if let Some(name) = token.strip_prefix('$') {
                assert!(name.starts_with(bastion_core::repository::RESERVED_BINDING_PREFIX));
            }
        }
    }
}
