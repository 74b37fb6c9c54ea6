//! Tenant domain model.
//!
//! Tenants provide full data isolation. Every other entity carries a
//! `tenant_id` and every read or write path filters on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An isolated customer or organization.
///
/// Tenants are never physically deleted. A soft delete stamps
/// `deleted_at` and clears `is_active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Globally unique, URL-safe identifier (e.g., `acme`). Also used as
    /// the subdomain label.
    pub slug: String,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Arbitrary key-value metadata.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Active and not soft-deleted.
    pub fn is_usable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub slug: String,
    pub metadata: Option<serde_json::Value>,
}

/// Fields that can be updated on an existing tenant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub is_active: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}

/// Returns `true` when `slug` is a valid tenant slug: 1 to 63 characters
/// of `[a-z0-9-]`, not starting or ending with `-`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 63
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("acme"));
        assert!(is_valid_slug("acme-2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("-acme"));
        assert!(!is_valid_slug("acme-"));
        assert!(!is_valid_slug("Acme"));
        assert!(!is_valid_slug("acme.corp"));
        assert!(!is_valid_slug(&"a".repeat(64)));
    }

    #[test]
    fn soft_deleted_tenant_is_not_usable() {
        let mut tenant = Tenant {
            id: Uuid::new_v4(),
            name: "Acme".into(),
            slug: "acme".into(),
            is_active: true,
            deleted_at: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(tenant.is_usable());

        tenant.deleted_at = Some(Utc::now());
        assert!(!tenant.is_usable());

        tenant.deleted_at = None;
        tenant.is_active = false;
        assert!(!tenant.is_usable());
    }
}
