//! SurrealDB implementation of [`UserRepository`].
//!
//! Passwords are hashed with Argon2id (m=19 MiB, t=2, p=1) and a fresh
//! random salt per hash. A server-side pepper can be prepended when the
//! repository is built with [`SurrealUserRepository::with_pepper`].

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::user::{CreateUser, UpdateUser, User, UserStatus};
use bastion_core::repository::{PaginatedResult, Pagination, UserRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use super::query::{Changes, CountRow, first_row, page, total};
use crate::error::{DbError, parse_uuid, query_error};

const SELECT_BY_ID: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('user', $id) \
                            WHERE tenant_id = $tenant_id";

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    tenant_id: String,
    role_id: String,
    username: String,
    email: String,
    password_hash: String,
    status: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, DbError> {
        let status = UserStatus::from_name(&row.status)
            .ok_or_else(|| DbError::Decode(format!("unknown user status: {}", row.status)))?;
        Ok(User {
            id: parse_uuid("user", &row.record_id)?,
            tenant_id: parse_uuid("tenant", &row.tenant_id)?,
            role_id: parse_uuid("role", &row.role_id)?,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            status,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Unique per-tenant login columns.
#[derive(Debug, Clone, Copy)]
enum Lookup {
    Username,
    Email,
}

impl Lookup {
    fn column(self) -> &'static str {
        match self {
            Lookup::Username => "username",
            Lookup::Email => "email",
        }
    }
}

fn hash_password(password: &str, pepper: Option<&str>) -> BastionResult<String> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| BastionError::Crypto(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let input = match pepper {
        Some(p) => format!("{p}{password}"),
        None => password.to_string(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input.as_bytes(), &salt)
        .map_err(|e| BastionError::Crypto(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    async fn find_by(&self, tenant_id: Uuid, lookup: Lookup, value: &str) -> BastionResult<User> {
        let column = lookup.column();
        let mut response = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE tenant_id = $tenant_id AND {column} = $value"
            ))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = response.take(0).map_err(DbError::from)?;
        Ok(first_row(rows, "user", format!("{column}={value}"))?.try_into()?)
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> BastionResult<User> {
        let id = Uuid::new_v4();
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;
        let sql = format!(
            "CREATE type::record('user', $id) SET \
             tenant_id = $tenant_id, role_id = $role_id, \
             username = $username, email = $email, \
             password_hash = $password_hash, status = $status, metadata = $metadata \
             RETURN NONE;\n{SELECT_BY_ID};"
        );

        let response = self
            .db
            .query(&sql)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("role_id", input.role_id.to_string()))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .bind(("password_hash", password_hash))
            .bind(("status", UserStatus::PendingVerification.as_str().to_string()))
            .bind(("metadata", input.metadata.unwrap_or_else(|| serde_json::json!({}))))
            .await
            .map_err(DbError::from)?;

        let mut response = response.check().map_err(|e| query_error("user", e))?;
        let rows: Vec<UserRow> = response.take(1).map_err(DbError::from)?;
        let user = User::try_from(first_row(rows, "user", id)?)?;

        info!(user_id = %user.id, tenant_id = %user.tenant_id, "User created");
        Ok(user)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<User> {
        let mut response = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = response.take(0).map_err(DbError::from)?;
        Ok(first_row(rows, "user", id)?.try_into()?)
    }

    async fn get_by_username(&self, tenant_id: Uuid, username: &str) -> BastionResult<User> {
        self.find_by(tenant_id, Lookup::Username, username).await
    }

    async fn get_by_email(&self, tenant_id: Uuid, email: &str) -> BastionResult<User> {
        self.find_by(tenant_id, Lookup::Email, email).await
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateUser) -> BastionResult<User> {
        let changes = Changes::new()
            .set("username", input.username)
            .set("email", input.email)
            .set("role_id", input.role_id.map(|r| r.to_string()))
            .set("status", input.status.map(|s| s.as_str()))
            .set("metadata", input.metadata);
        let sql = format!(
            "UPDATE type::record('user', $id) SET {} WHERE tenant_id = $tenant_id RETURN NONE;\n\
             {SELECT_BY_ID};",
            changes.assignments()
        );

        let query = self
            .db
            .query(&sql)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));
        let response = changes.bind(query).await.map_err(DbError::from)?;

        let mut response = response.check().map_err(|e| query_error("user", e))?;
        let rows: Vec<UserRow> = response.take(1).map_err(DbError::from)?;
        Ok(first_row(rows, "user", id)?.try_into()?)
    }

    /// Identities are deactivated rather than removed so audit entries
    /// keep pointing at a real actor.
    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        self.update(
            tenant_id,
            id,
            UpdateUser {
                status: Some(UserStatus::Inactive),
                ..Default::default()
            },
        )
        .await?;

        info!(user_id = %id, %tenant_id, "User deactivated");
        Ok(())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> BastionResult<PaginatedResult<User>> {
        let mut response = self
            .db
            .query(
                "SELECT count() AS total FROM user WHERE tenant_id = $tenant_id GROUP ALL;\n\
                 SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC LIMIT $limit START $offset;",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let counts: Vec<CountRow> = response.take(0).map_err(DbError::from)?;
        let rows: Vec<UserRow> = response.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page(items, total(&counts), &pagination))
    }
}
