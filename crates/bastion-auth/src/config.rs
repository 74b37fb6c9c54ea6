//! Authentication configuration.

use std::time::Duration;

/// How long issued credentials stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for Lifetimes {
    fn default() -> Self {
        Self {
            access: Duration::from_secs(15 * 60),
            refresh: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Ed25519 signing key, PKCS#8 PEM.
    pub signing_key_pem: String,
    /// Ed25519 verifying key, SPKI PEM.
    pub verifying_key_pem: String,
    /// `iss` claim written into and required from access tokens.
    pub issuer: String,
    pub lifetimes: Lifetimes,
    /// Prepended to passwords before hashing. Must match the pepper the
    /// identity repository hashes with.
    pub pepper: Option<String>,
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key_pem: String::new(),
            verifying_key_pem: String::new(),
            issuer: "bastion".into(),
            lifetimes: Lifetimes::default(),
            pepper: None,
            min_password_length: 12,
        }
    }
}
