//! SurrealDB implementation of [`SessionRepository`].
//!
//! Only the SHA-256 of a refresh token is stored; lookups go by that
//! hash and never echo it back in errors.

use std::collections::HashSet;

use bastion_core::error::BastionResult;
use bastion_core::models::session::{CreateSession, Session};
use bastion_core::repository::SessionRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};
use uuid::Uuid;

use super::query::first_row;
use crate::error::{DbError, parse_uuid, query_error};

const SELECT_BY_ID: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('session', $id) \
                            WHERE tenant_id = $tenant_id";

#[derive(Debug, SurrealValue)]
struct SessionRow {
    record_id: String,
    tenant_id: String,
    user_id: String,
    token_hash: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = DbError;

    fn try_from(row: SessionRow) -> Result<Self, DbError> {
        Ok(Session {
            id: parse_uuid("session", &row.record_id)?,
            tenant_id: parse_uuid("tenant", &row.tenant_id)?,
            user_id: parse_uuid("user", &row.user_id)?,
            token_hash: row.token_hash,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

/// What callers of `DELETE ... RETURN BEFORE` need from each removed row.
#[derive(Debug, SurrealValue)]
struct RemovedRow {
    tenant_id: String,
}

#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(&self, input: CreateSession) -> BastionResult<Session> {
        let id = Uuid::new_v4();
        let sql = format!(
            "CREATE type::record('session', $id) SET \
             tenant_id = $tenant_id, user_id = $user_id, token_hash = $token_hash, \
             ip_address = $ip_address, user_agent = $user_agent, expires_at = $expires_at \
             RETURN NONE;\n{SELECT_BY_ID};"
        );

        let response = self
            .db
            .query(&sql)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("token_hash", input.token_hash))
            .bind(("ip_address", input.ip_address))
            .bind(("user_agent", input.user_agent))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut response = response.check().map_err(|e| query_error("session", e))?;
        let rows: Vec<SessionRow> = response.take(1).map_err(DbError::from)?;
        Ok(first_row(rows, "session", id)?.try_into()?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<Session> {
        let mut response = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = response.take(0).map_err(DbError::from)?;
        Ok(first_row(rows, "session", id)?.try_into()?)
    }

    async fn get_by_token_hash(&self, tenant_id: Uuid, token_hash: &str) -> BastionResult<Session> {
        let mut response = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM session \
                 WHERE tenant_id = $tenant_id AND token_hash = $token_hash",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = response.take(0).map_err(DbError::from)?;
        Ok(first_row(rows, "session", "token")?.try_into()?)
    }

    async fn invalidate(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<bool> {
        let response = self
            .db
            .query(
                "DELETE type::record('session', $id) WHERE tenant_id = $tenant_id \
                 RETURN BEFORE",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut response = response.check().map_err(|e| query_error("session", e))?;
        let removed: Vec<RemovedRow> = response.take(0).map_err(DbError::from)?;
        Ok(!removed.is_empty())
    }

    async fn invalidate_user_sessions(&self, tenant_id: Uuid, user_id: Uuid) -> BastionResult<()> {
        self.db
            .query("DELETE session WHERE tenant_id = $tenant_id AND user_id = $user_id")
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| query_error("session", e))?;

        info!(%tenant_id, %user_id, "User sessions revoked");
        Ok(())
    }

    async fn cleanup_expired(&self) -> BastionResult<u64> {
        let response = self
            .db
            .query("DELETE session WHERE expires_at < time::now() RETURN BEFORE")
            .await
            .map_err(DbError::from)?;

        let mut response = response.check().map_err(|e| query_error("session", e))?;
        let removed: Vec<RemovedRow> = response.take(0).map_err(DbError::from)?;
        let count = removed.len() as u64;

        if count > 0 {
            let tenants: HashSet<&str> = removed.iter().map(|r| r.tenant_id.as_str()).collect();
            debug!(removed = count, tenants = tenants.len(), "Expired sessions removed");
        }
        Ok(count)
    }
}
