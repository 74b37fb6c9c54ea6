//! SurrealDB implementation of [`RoleRepository`].
//!
//! Capability mappings are stored as a flat object of
//! `capability_name -> bool`. Names this build does not know are dropped
//! on load so they can never grant anything.

use bastion_core::error::BastionResult;
use bastion_core::models::capability::Capability;
use bastion_core::models::role::{CapabilityMap, CreateRole, Role, UpdateRole};
use bastion_core::repository::{PaginatedResult, Pagination, RoleRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{info, warn};
use uuid::Uuid;

use super::query::{Changes, CountRow, first_row, page, total};
use crate::error::{DbError, parse_uuid, query_error};

const SELECT_BY_ID: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('role', $id)";

/// Roles visible from one tenant: its own plus the global ones.
const VISIBLE: &str = "(tenant_id = $tenant_id OR tenant_id = NONE)";

#[derive(Debug, SurrealValue)]
struct RoleRow {
    record_id: String,
    tenant_id: Option<String>,
    name: String,
    description: String,
    is_superuser: bool,
    capabilities: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RoleRow> for Role {
    type Error = DbError;

    fn try_from(row: RoleRow) -> Result<Self, DbError> {
        let id = parse_uuid("role", &row.record_id)?;
        let tenant_id = row
            .tenant_id
            .as_deref()
            .map(|t| parse_uuid("tenant", t))
            .transpose()?;
        Ok(Role {
            id,
            tenant_id,
            capabilities: capabilities_from_value(id, &row.capabilities),
            name: row.name,
            description: row.description,
            is_superuser: row.is_superuser,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_roles(rows: Vec<RoleRow>) -> Result<Vec<Role>, DbError> {
    rows.into_iter().map(Role::try_from).collect()
}

fn capabilities_to_value(map: &CapabilityMap) -> serde_json::Value {
    serde_json::Value::Object(
        map.iter()
            .map(|(cap, granted)| (cap.as_str().to_string(), serde_json::Value::Bool(*granted)))
            .collect(),
    )
}

fn capabilities_from_value(role_id: Uuid, value: &serde_json::Value) -> CapabilityMap {
    let Some(object) = value.as_object() else {
        warn!(%role_id, "Role capabilities are not an object; treating as empty");
        return CapabilityMap::new();
    };

    let mut map = CapabilityMap::new();
    for (name, granted) in object {
        match (name.parse::<Capability>(), granted.as_bool()) {
            (Ok(cap), Some(granted)) => {
                map.insert(cap, granted);
            }
            _ => warn!(%role_id, capability = %name, "Ignoring unknown or malformed capability"),
        }
    }
    map
}

#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> BastionResult<Role> {
        let id = Uuid::new_v4();
        let sql = format!(
            "CREATE type::record('role', $id) SET \
             tenant_id = $tenant_id, name = $name, description = $description, \
             is_superuser = $is_superuser, capabilities = $capabilities \
             RETURN NONE;\n{SELECT_BY_ID};"
        );

        let response = self
            .db
            .query(&sql)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.map(|t| t.to_string())))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("is_superuser", input.is_superuser))
            .bind(("capabilities", capabilities_to_value(&input.capabilities)))
            .await
            .map_err(DbError::from)?;

        let mut response = response.check().map_err(|e| query_error("role", e))?;
        let rows: Vec<RoleRow> = response.take(1).map_err(DbError::from)?;
        let role = Role::try_from(first_row(rows, "role", id)?)?;

        info!(role_id = %role.id, tenant_id = ?role.tenant_id, name = %role.name, "Role created");
        Ok(role)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<Role> {
        let mut response = self
            .db
            .query(format!("{SELECT_BY_ID} WHERE {VISIBLE}"))
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = response.take(0).map_err(DbError::from)?;
        Ok(first_row(rows, "role", id)?.try_into()?)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateRole) -> BastionResult<Role> {
        let changes = Changes::new()
            .set("name", input.name)
            .set("description", input.description)
            .set("is_superuser", input.is_superuser)
            .set("capabilities", input.capabilities.as_ref().map(capabilities_to_value));
        // Only the owning tenant may edit; global roles never match.
        let sql = format!(
            "UPDATE type::record('role', $id) SET {} WHERE tenant_id = $tenant_id RETURN NONE;\n\
             {SELECT_BY_ID} WHERE tenant_id = $tenant_id;",
            changes.assignments()
        );

        let query = self
            .db
            .query(&sql)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()));
        let response = changes.bind(query).await.map_err(DbError::from)?;

        let mut response = response.check().map_err(|e| query_error("role", e))?;
        let rows: Vec<RoleRow> = response.take(1).map_err(DbError::from)?;
        Ok(first_row(rows, "role", id)?.try_into()?)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> BastionResult<()> {
        // Identities still holding the role are denied from then on.
        self.db
            .query("DELETE type::record('role', $id) WHERE tenant_id = $tenant_id")
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| query_error("role", e))?;

        Ok(())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> BastionResult<PaginatedResult<Role>> {
        let sql = format!(
            "SELECT count() AS total FROM role WHERE {VISIBLE} GROUP ALL;\n\
             SELECT meta::id(id) AS record_id, * FROM role WHERE {VISIBLE} \
             ORDER BY created_at ASC LIMIT $limit START $offset;"
        );

        let mut response = self
            .db
            .query(&sql)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let counts: Vec<CountRow> = response.take(0).map_err(DbError::from)?;
        let rows: Vec<RoleRow> = response.take(1).map_err(DbError::from)?;
        Ok(page(into_roles(rows)?, total(&counts), &pagination))
    }

    async fn list_all(&self) -> BastionResult<Vec<Role>> {
        let mut response = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM role")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = response.take(0).map_err(DbError::from)?;
        Ok(into_roles(rows)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_map_roundtrips_through_json() {
        let mut map = CapabilityMap::new();
        map.insert(Capability::Publish, true);
        map.insert(Capability::DeleteTenant, false);

        let value = capabilities_to_value(&map);
        assert_eq!(value["publish"], serde_json::json!(true));
        assert_eq!(capabilities_from_value(Uuid::nil(), &value), map);
    }

    #[test]
    fn unknown_and_non_bool_capabilities_are_dropped() {
        let value = serde_json::json!({
            "publish": true,
            "become_root": true,
            "manage_seo": "yes",
        });
        let map = capabilities_from_value(Uuid::nil(), &value);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&Capability::Publish), Some(&true));
    }

    #[test]
    fn non_object_capabilities_yield_empty_map() {
        let map = capabilities_from_value(Uuid::nil(), &serde_json::json!(["publish"]));
        assert!(map.is_empty());
    }
}
