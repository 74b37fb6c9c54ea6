//! Versioned schema migrations.
//!
//! Every table is SCHEMAFULL. Ids are UUID strings and enum columns are
//! snake_case strings guarded by ASSERT. A migration and the
//! `_migration` row recording it commit in one transaction, so a failed
//! migration leaves no trace and is retried on the next start.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

const BOOKKEEPING: &str = r#"
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON _migration TYPE datetime DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON _migration COLUMNS version UNIQUE;
"#;

struct Migration {
    version: u32,
    name: &'static str,
    ddl: &'static str,
}

impl Migration {
    /// The DDL plus its bookkeeping row as one transaction.
    fn script(&self) -> String {
        format!(
            "BEGIN TRANSACTION;\n{}\nCREATE _migration SET version = $version, name = $name;\n\
             COMMIT TRANSACTION;",
            self.ddl.trim()
        )
    }
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "tenancy_and_identity",
        ddl: TENANCY_AND_IDENTITY,
    },
    Migration {
        version: 2,
        name: "audit_log",
        ddl: AUDIT_LOG,
    },
];

const TENANCY_AND_IDENTITY: &str = r#"
-- Tenants are global and only ever soft-deleted.
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON tenant TYPE string;
DEFINE FIELD slug ON tenant TYPE string ASSERT string::len($value) > 0 AND string::len($value) <= 63;
DEFINE FIELD is_active ON tenant TYPE bool DEFAULT true;
DEFINE FIELD deleted_at ON tenant TYPE option<datetime>;
DEFINE FIELD metadata ON tenant TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON tenant TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON tenant TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON tenant COLUMNS slug UNIQUE;

-- Roles without a tenant_id are global.
DEFINE TABLE role SCHEMAFULL;
DEFINE FIELD tenant_id ON role TYPE option<string>;
DEFINE FIELD name ON role TYPE string;
DEFINE FIELD description ON role TYPE string;
DEFINE FIELD is_superuser ON role TYPE bool DEFAULT false;
DEFINE FIELD capabilities ON role TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON role TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON role TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_role_tenant_name ON role COLUMNS tenant_id, name UNIQUE;

DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON user TYPE string;
DEFINE FIELD role_id ON user TYPE string;
DEFINE FIELD username ON user TYPE string;
DEFINE FIELD email ON user TYPE string;
DEFINE FIELD password_hash ON user TYPE string;
DEFINE FIELD status ON user TYPE string
    ASSERT $value IN ['active', 'inactive', 'locked', 'pending_verification'];
DEFINE FIELD metadata ON user TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON user TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON user TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_user_tenant_username ON user COLUMNS tenant_id, username UNIQUE;
DEFINE INDEX idx_user_tenant_email ON user COLUMNS tenant_id, email UNIQUE;
DEFINE INDEX idx_user_tenant_role ON user COLUMNS tenant_id, role_id;

DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD tenant_id ON session TYPE string;
DEFINE FIELD user_id ON session TYPE string;
DEFINE FIELD token_hash ON session TYPE string;
DEFINE FIELD ip_address ON session TYPE option<string>;
DEFINE FIELD user_agent ON session TYPE option<string>;
DEFINE FIELD expires_at ON session TYPE datetime;
DEFINE FIELD created_at ON session TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_session_token ON session COLUMNS tenant_id, token_hash UNIQUE;
DEFINE INDEX idx_session_user ON session COLUMNS tenant_id, user_id;
"#;

const AUDIT_LOG: &str = r#"
-- Append-only: rows can be created and read, never changed.
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS FOR create, select FULL FOR update, delete NONE;
DEFINE FIELD tenant_id ON audit_log TYPE string;
DEFINE FIELD actor_id ON audit_log TYPE string;
DEFINE FIELD actor_type ON audit_log TYPE string
    ASSERT $value IN ['user', 'service_account', 'system'];
DEFINE FIELD action ON audit_log TYPE string;
DEFINE FIELD target_type ON audit_log TYPE string;
DEFINE FIELD target_id ON audit_log TYPE option<string>;
DEFINE FIELD outcome ON audit_log TYPE string
    ASSERT $value IN ['success', 'failure', 'denied'];
DEFINE FIELD before ON audit_log TYPE option<object> FLEXIBLE;
DEFINE FIELD after ON audit_log TYPE option<object> FLEXIBLE;
DEFINE FIELD ip_address ON audit_log TYPE option<string>;
DEFINE FIELD timestamp ON audit_log TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_audit_tenant_time ON audit_log COLUMNS tenant_id, timestamp;
DEFINE INDEX idx_audit_tenant_actor ON audit_log COLUMNS tenant_id, actor_id;
DEFINE INDEX idx_audit_tenant_target ON audit_log COLUMNS tenant_id, target_type, target_id;
"#;

#[derive(Debug, SurrealValue)]
struct Applied {
    version: u32,
}

async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut response = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let rows: Vec<Applied> = response.take(0)?;
    Ok(rows.first().map_or(0, |r| r.version))
}

/// Bring the schema up to [`latest_version`]. Safe to call on every
/// start; already-applied migrations are skipped.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(BOOKKEEPING)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("bookkeeping table: {e}")))?;

    let current = applied_version(db).await?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(version = migration.version, name = migration.name, "Applying migration");

        db.query(migration.script())
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!("v{} {}: {e}", migration.version, migration.name))
            })?;
    }

    if current < latest_version() {
        info!(from = current, to = latest_version(), "Schema up to date");
    }
    Ok(())
}

/// The newest schema version this build knows.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}
