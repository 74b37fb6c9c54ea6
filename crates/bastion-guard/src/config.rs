//! Guard configuration.

use serde::Deserialize;

/// Tenant resolution settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Base domain used to read a tenant from the host subdomain
    /// (e.g. `cms.example.com` makes `acme.cms.example.com` resolve to
    /// `acme`). `None` disables host-based resolution.
    pub base_domain: Option<String>,
    /// Slug or UUID used when a request names no tenant at all.
    pub default_tenant: Option<String>,
    /// Cache entry lifetime in seconds.
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_domain: None,
            default_tenant: None,
            cache_ttl_secs: 30,
            cache_capacity: 10_000,
        }
    }
}

/// Access gate settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Write a `Denied` audit row for every permission denial.
    pub audit_denials: bool,
}
