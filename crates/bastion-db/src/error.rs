//! Database-specific error types and conversions.

use bastion_core::error::BastionError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Stored row is malformed: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated on {entity}")]
    Duplicate { entity: String },
}

impl From<DbError> for BastionError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => BastionError::NotFound { entity, id },
            DbError::Duplicate { entity } => BastionError::AlreadyExists { entity },
            other => BastionError::Database(other.to_string()),
        }
    }
}

/// Classify a failed statement. Unique index violations become
/// [`DbError::Duplicate`].
pub(crate) fn query_error(entity: &str, err: surrealdb::Error) -> DbError {
    let message = err.to_string();
    if message.contains("already contains") {
        DbError::Duplicate {
            entity: entity.to_string(),
        }
    } else {
        DbError::Query(message)
    }
}

/// Classify a failed statement of a staged write. A unique index
/// violation names the table of the conflicting record.
pub(crate) fn write_error(err: surrealdb::Error) -> DbError {
    match conflicting_table(err.message()) {
        Some(table) => DbError::Duplicate {
            entity: table.to_string(),
        },
        None => DbError::Query(err.to_string()),
    }
}

/// Table of the record named by a unique index violation.
fn conflicting_table(message: &str) -> Option<&str> {
    if !message.contains("already contains") {
        return None;
    }
    let (_, record) = message.split_once("with record `")?;
    let (table, _) = record.split_once(':')?;
    (!table.is_empty()).then_some(table)
}

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_maps_to_already_exists() {
        let err: BastionError = DbError::Duplicate {
            entity: "tenant".into(),
        }
        .into();
        assert!(matches!(err, BastionError::AlreadyExists { entity } if entity == "tenant"));
    }

    #[test]
    fn unique_violation_names_the_conflicting_table() {
        let err = write_error(surrealdb::Error::internal(
            "Database index `idx_tenant_slug` already contains 'acme', with record `tenant:⟨0b5e⟩`"
                .into(),
        ));
        assert!(matches!(err, DbError::Duplicate { entity } if entity == "tenant"));

        let err = write_error(surrealdb::Error::internal("Found 'x' for field `slug`".into()));
        assert!(matches!(err, DbError::Query(_)));
    }

    #[test]
    fn decode_failures_are_database_errors() {
        let err: BastionError = parse_uuid("tenant", "nope").unwrap_err().into();
        assert!(matches!(err, BastionError::Database(_)));
    }
}
