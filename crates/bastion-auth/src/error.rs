//! Authentication error types.

use bastion_core::error::BastionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is locked")]
    AccountLocked,

    #[error("account is inactive")]
    AccountInactive,

    #[error("account is pending verification")]
    AccountPendingVerification,

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for BastionError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::PasswordTooShort { .. } => BastionError::Validation {
                message: err.to_string(),
            },
            AuthError::Crypto(msg) => BastionError::Crypto(msg),
            other => BastionError::AuthenticationFailed {
                reason: other.to_string(),
            },
        }
    }
}
