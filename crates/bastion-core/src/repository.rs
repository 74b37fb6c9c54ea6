//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped repositories
//! require a `tenant_id` parameter to enforce data isolation.

use uuid::Uuid;

use crate::error::BastionResult;
use crate::models::{
    audit::{AuditLogEntry, AuditOutcome, CreateAuditLogEntry},
    role::{CreateRole, Role, UpdateRole},
    session::{CreateSession, Session},
    tenant::{CreateTenant, Tenant, UpdateTenant},
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenants (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = BastionResult<Tenant>> + Send;
    /// Returns soft-deleted tenants too; callers decide usability.
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = BastionResult<Tenant>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = BastionResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = BastionResult<Tenant>> + Send;
    /// Soft-delete: stamps `deleted_at` and deactivates. Rows are never removed.
    fn soft_delete(&self, id: Uuid) -> impl Future<Output = BastionResult<()>> + Send;
    /// Lists tenants that are not soft-deleted.
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = BastionResult<PaginatedResult<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped repositories
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = BastionResult<User>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = BastionResult<User>> + Send;
    fn get_by_username(
        &self,
        tenant_id: Uuid,
        username: &str,
    ) -> impl Future<Output = BastionResult<User>> + Send;
    fn get_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> impl Future<Output = BastionResult<User>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = BastionResult<User>> + Send;
    /// Deactivates the identity. The row is kept for audit references.
    fn delete(&self, tenant_id: Uuid, id: Uuid)
    -> impl Future<Output = BastionResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = BastionResult<PaginatedResult<User>>> + Send;
}

pub trait RoleRepository: Send + Sync {
    fn create(&self, input: CreateRole) -> impl Future<Output = BastionResult<Role>> + Send;
    /// Finds a role owned by `tenant_id` or a global role.
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = BastionResult<Role>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateRole,
    ) -> impl Future<Output = BastionResult<Role>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid)
    -> impl Future<Output = BastionResult<()>> + Send;
    /// Roles usable in `tenant_id`: its own plus global ones.
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = BastionResult<PaginatedResult<Role>>> + Send;
    /// Every role across all tenants. Used to build the in-process role
    /// catalog.
    fn list_all(&self) -> impl Future<Output = BastionResult<Vec<Role>>> + Send;
}

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession)
    -> impl Future<Output = BastionResult<Session>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = BastionResult<Session>> + Send;
    fn get_by_token_hash(
        &self,
        tenant_id: Uuid,
        token_hash: &str,
    ) -> impl Future<Output = BastionResult<Session>> + Send;
    /// Invalidate a single session. Returns whether this call removed it;
    /// of two concurrent calls for one session at most one sees `true`.
    fn invalidate(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = BastionResult<bool>> + Send;
    /// Invalidate all sessions for a user (e.g., on password change).
    fn invalidate_user_sessions(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = BastionResult<()>> + Send;
    /// Remove expired sessions of every tenant, soft-deleted ones
    /// included. Returns how many were removed.
    fn cleanup_expired(&self) -> impl Future<Output = BastionResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only, tenant-scoped)
// ---------------------------------------------------------------------------

/// Binding names starting with this prefix are reserved for the audit
/// insert that accompanies a staged write.
pub const RESERVED_BINDING_PREFIX: &str = "audit_";

/// A mutation prepared by a handler but not yet applied.
///
/// `query` holds one or more SurrealQL statements. They run inside the
/// same transaction as the audit insert, so a `THROW` (or any failing
/// statement) rolls back both.
#[derive(Debug, Clone, Default)]
pub struct StagedWrite {
    pub query: String,
    pub bindings: Vec<(String, serde_json::Value)>,
}

impl StagedWrite {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            bindings: Vec::new(),
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.bindings.push((name.into(), value.into()));
        self
    }

    /// Returns the first binding name that collides with the reserved
    /// audit prefix, if any.
    pub fn reserved_binding(&self) -> Option<&str> {
        self.bindings
            .iter()
            .map(|(name, _)| name.as_str())
            .find(|name| name.starts_with(RESERVED_BINDING_PREFIX))
    }
}

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub outcome: Option<AuditOutcome>,
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    pub to: Option<chrono::DateTime<chrono::Utc>>,
}

/// Write side of the audit log. No update or delete operations exist.
pub trait AuditLogWriter: Send + Sync {
    /// Append a new audit log entry on its own.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = BastionResult<AuditLogEntry>> + Send;

    /// Apply `write` and append `entry` in a single transaction. Either
    /// both persist or neither does.
    ///
    /// A failing staged statement keeps its own kind (`AlreadyExists`,
    /// `Validation` for a thrown error, `Database` otherwise). Only a
    /// failing audit insert is reported as `AuditWrite`.
    fn commit_with_audit(
        &self,
        write: StagedWrite,
        entry: CreateAuditLogEntry,
    ) -> impl Future<Output = BastionResult<AuditLogEntry>> + Send;
}

/// Read side of the audit log.
pub trait AuditLogReader: Send + Sync {
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = BastionResult<AuditLogEntry>> + Send;
    /// Newest entries first.
    fn list(
        &self,
        tenant_id: Uuid,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = BastionResult<PaginatedResult<AuditLogEntry>>> + Send;
}
