//! SurrealDB implementation of [`TenantRepository`].
//!
//! Tenants are global rows keyed by UUID with a unique slug. They are
//! never removed: a soft delete stamps `deleted_at`, and a soft-deleted
//! tenant can no longer be updated.

use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::tenant::{CreateTenant, Tenant, UpdateTenant, is_valid_slug};
use bastion_core::repository::{PaginatedResult, Pagination, TenantRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use super::query::{Changes, CountRow, first_row, page, total};
use crate::error::{DbError, parse_uuid, query_error};

const SELECT_BY_ID: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('tenant', $id)";

#[derive(Debug, SurrealValue)]
struct TenantRow {
    record_id: String,
    name: String,
    slug: String,
    is_active: bool,
    deleted_at: Option<DateTime<Utc>>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = DbError;

    fn try_from(row: TenantRow) -> Result<Self, DbError> {
        Ok(Tenant {
            id: parse_uuid("tenant", &row.record_id)?,
            name: row.name,
            slug: row.slug,
            is_active: row.is_active,
            deleted_at: row.deleted_at,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn check_slug(slug: &str) -> BastionResult<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(BastionError::Validation {
            message: format!("invalid tenant slug: {slug:?}"),
        })
    }
}

#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> BastionResult<Tenant> {
        check_slug(&input.slug)?;

        let id = Uuid::new_v4();
        let sql = format!(
            "CREATE type::record('tenant', $id) SET \
             name = $name, slug = $slug, metadata = $metadata \
             RETURN NONE;\n{SELECT_BY_ID};"
        );

        let response = self
            .db
            .query(&sql)
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .bind(("metadata", input.metadata.unwrap_or_else(|| serde_json::json!({}))))
            .await
            .map_err(DbError::from)?;

        let mut response = response.check().map_err(|e| query_error("tenant", e))?;
        let rows: Vec<TenantRow> = response.take(1).map_err(DbError::from)?;
        let tenant = Tenant::try_from(first_row(rows, "tenant", id)?)?;

        info!(tenant_id = %tenant.id, slug = %tenant.slug, "Tenant created");
        Ok(tenant)
    }

    async fn get_by_id(&self, id: Uuid) -> BastionResult<Tenant> {
        let mut response = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = response.take(0).map_err(DbError::from)?;
        Ok(first_row(rows, "tenant", id)?.try_into()?)
    }

    async fn get_by_slug(&self, slug: &str) -> BastionResult<Tenant> {
        let mut response = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM tenant WHERE slug = $slug")
            .bind(("slug", slug.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = response.take(0).map_err(DbError::from)?;
        Ok(first_row(rows, "tenant", format!("slug={slug}"))?.try_into()?)
    }

    async fn update(&self, id: Uuid, input: UpdateTenant) -> BastionResult<Tenant> {
        if let Some(slug) = input.slug.as_deref() {
            check_slug(slug)?;
        }

        let changes = Changes::new()
            .set("name", input.name)
            .set("slug", input.slug)
            .set("is_active", input.is_active)
            .set("metadata", input.metadata);
        // Soft-deleted tenants stay frozen and read as missing here.
        let sql = format!(
            "UPDATE type::record('tenant', $id) SET {} WHERE deleted_at = NONE RETURN NONE;\n\
             {SELECT_BY_ID} WHERE deleted_at = NONE;",
            changes.assignments()
        );

        let query = self.db.query(&sql).bind(("id", id.to_string()));
        let response = changes.bind(query).await.map_err(DbError::from)?;

        let mut response = response.check().map_err(|e| query_error("tenant", e))?;
        let rows: Vec<TenantRow> = response.take(1).map_err(DbError::from)?;
        Ok(first_row(rows, "tenant", id)?.try_into()?)
    }

    async fn soft_delete(&self, id: Uuid) -> BastionResult<()> {
        let sql = format!(
            "UPDATE type::record('tenant', $id) SET \
             is_active = false, \
             deleted_at = deleted_at ?? time::now(), \
             updated_at = time::now() \
             RETURN NONE;\n{SELECT_BY_ID};"
        );

        let response = self
            .db
            .query(&sql)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut response = response.check().map_err(|e| query_error("tenant", e))?;
        let rows: Vec<TenantRow> = response.take(1).map_err(DbError::from)?;
        first_row(rows, "tenant", id)?;

        info!(tenant_id = %id, "Tenant soft-deleted");
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> BastionResult<PaginatedResult<Tenant>> {
        let mut response = self
            .db
            .query(
                "SELECT count() AS total FROM tenant WHERE deleted_at = NONE GROUP ALL;\n\
                 SELECT meta::id(id) AS record_id, * FROM tenant \
                 WHERE deleted_at = NONE \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset;",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let counts: Vec<CountRow> = response.take(0).map_err(DbError::from)?;
        let rows: Vec<TenantRow> = response.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(Tenant::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page(items, total(&counts), &pagination))
    }
}
