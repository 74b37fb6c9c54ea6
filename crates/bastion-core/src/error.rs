//! Error types for the Bastion system.

use thiserror::Error;

/// Stable, non-leaking message returned for every permission denial.
///
/// Callers must not be able to tell an unknown capability from one the
/// identity simply lacks.
pub const PERMISSION_DENIED_REASON: &str = "permission denied";

#[derive(Debug, Error)]
pub enum BastionError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// The request carried no usable tenant, or the tenant it named is
    /// unknown, inactive or soft-deleted.
    #[error("Tenant could not be resolved: {reason}")]
    NoTenant { reason: String },

    #[error("Authorization denied: {}", PERMISSION_DENIED_REASON)]
    PermissionDenied,

    /// Writing the audit trail failed. The enclosing transaction has
    /// been rolled back.
    #[error("Audit write failed, transaction rolled back: {0}")]
    AuditWrite(String),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BastionError {
    /// HTTP-equivalent status code for the transport layer.
    pub fn status_code(&self) -> u16 {
        match self {
            BastionError::NoTenant { .. } => 400,
            BastionError::AuthenticationFailed { .. } => 401,
            BastionError::PermissionDenied => 403,
            BastionError::NotFound { .. } => 404,
            BastionError::AlreadyExists { .. } => 409,
            BastionError::Validation { .. } => 422,
            BastionError::AuditWrite(_)
            | BastionError::Database(_)
            | BastionError::Crypto(_)
            | BastionError::Internal(_) => 500,
        }
    }

    /// Whether the failure was caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

pub type BastionResult<T> = Result<T, BastionError>;
