//! Password verification and policy.

use std::borrow::Cow;

use argon2::password_hash::{Error as HashError, PasswordHash};
use argon2::{Argon2, PasswordVerifier};

use crate::error::AuthError;

/// The bytes actually fed to Argon2: `pepper || password`.
fn peppered<'a>(password: &'a str, pepper: Option<&str>) -> Cow<'a, str> {
    match pepper {
        Some(p) => Cow::Owned(format!("{p}{password}")),
        None => Cow::Borrowed(password),
    }
}

/// Verify a plaintext password against a PHC-format Argon2 hash.
///
/// A malformed stored hash is an error, not a mismatch.
pub fn verify_password(
    password: &str,
    stored_hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(peppered(password, pepper).as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// Minimum length, counted in characters rather than bytes.
pub fn check_policy(password: &str, min_length: usize) -> Result<(), AuthError> {
    if password.chars().count() < min_length {
        return Err(AuthError::PasswordTooShort { min: min_length });
    }
    Ok(())
}
