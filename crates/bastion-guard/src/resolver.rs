//! Tenant resolution.
//!
//! Sources are tried in a fixed order: credential claim, `X-Tenant`
//! header, path parameter, host subdomain, configured default. The first
//! source that is present decides; if it names nothing usable the
//! request fails instead of falling through.

use std::time::Duration;

use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::tenant::{Tenant, is_valid_slug};
use bastion_core::repository::TenantRepository;
use moka::future::Cache;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ResolverConfig;
use crate::context::RequestContext;

/// Where a tenant identifier was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantSource {
    Claim,
    Header,
    Path,
    Host,
    Default,
}

/// A tenant identifier after normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TenantKey {
    Id(Uuid),
    Slug(String),
}

impl TenantKey {
    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Ok(id) = Uuid::parse_str(trimmed) {
            return Some(TenantKey::Id(id));
        }
        let slug = trimmed.to_ascii_lowercase();
        is_valid_slug(&slug).then_some(TenantKey::Slug(slug))
    }

    fn cache_key(&self) -> String {
        match self {
            TenantKey::Id(id) => id.to_string(),
            TenantKey::Slug(slug) => slug.clone(),
        }
    }
}

fn no_tenant(reason: &str) -> BastionError {
    BastionError::NoTenant {
        reason: reason.to_string(),
    }
}

/// Leftmost label of `host` when it sits directly under `base_domain`.
fn subdomain(host: &str, base_domain: &str) -> Option<String> {
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let base = base_domain.trim_matches('.').to_ascii_lowercase();

    let label = host.strip_suffix(&base)?.strip_suffix('.')?;
    (!label.is_empty() && !label.contains('.')).then(|| label.to_string())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Resolves the active tenant of a request, with a TTL cache in front of
/// storage.
pub struct TenantResolver<T: TenantRepository> {
    tenants: T,
    cache: Cache<String, Tenant>,
    base_domain: Option<String>,
    default_tenant: Option<String>,
}

impl<T: TenantRepository> TenantResolver<T> {
    pub fn new(tenants: T, config: ResolverConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();
        Self {
            tenants,
            cache,
            base_domain: config.base_domain,
            default_tenant: config.default_tenant,
        }
    }

    /// The authoritative tenant source of `ctx`, if any.
    pub fn select_source(&self, ctx: &RequestContext) -> Option<(TenantSource, String)> {
        if let Some(v) = present(&ctx.tenant_claim) {
            return Some((TenantSource::Claim, v.to_string()));
        }
        if let Some(v) = present(&ctx.tenant_header) {
            return Some((TenantSource::Header, v.to_string()));
        }
        if let Some(v) = present(&ctx.path_tenant) {
            return Some((TenantSource::Path, v.to_string()));
        }
        if let (Some(host), Some(base)) = (present(&ctx.host), self.base_domain.as_deref())
            && let Some(label) = subdomain(host, base)
        {
            return Some((TenantSource::Host, label));
        }
        present(&self.default_tenant).map(|v| (TenantSource::Default, v.to_string()))
    }

    pub async fn resolve(&self, ctx: &RequestContext) -> BastionResult<Tenant> {
        let Some((source, raw)) = self.select_source(ctx) else {
            return Err(no_tenant("request names no tenant"));
        };
        let tenant = self.lookup(&raw).await.inspect_err(|e| {
            debug!(?source, raw = %raw, error = %e, "Tenant resolution failed");
        })?;

        if !tenant.is_usable() {
            warn!(tenant_id = %tenant.id, ?source, "Request for unusable tenant");
            return Err(no_tenant("tenant is inactive or deleted"));
        }
        Ok(tenant)
    }

    /// Find a tenant by raw identifier, usable or not.
    pub async fn lookup(&self, raw: &str) -> BastionResult<Tenant> {
        let key = TenantKey::parse(raw).ok_or_else(|| no_tenant("malformed tenant identifier"))?;
        let cache_key = key.cache_key();

        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(cached);
        }

        let found = match &key {
            TenantKey::Id(id) => self.tenants.get_by_id(*id).await,
            TenantKey::Slug(slug) => self.tenants.get_by_slug(slug).await,
        };
        let tenant = match found {
            Ok(t) => t,
            Err(BastionError::NotFound { .. }) => return Err(no_tenant("unknown tenant")),
            Err(e) => return Err(e),
        };

        self.cache.insert(cache_key, tenant.clone()).await;
        Ok(tenant)
    }

    /// Drop one cached identifier, e.g. after a tenant was renamed or
    /// deactivated.
    pub async fn invalidate(&self, raw: &str) {
        if let Some(key) = TenantKey::parse(raw) {
            self.cache.invalidate(&key.cache_key()).await;
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_normalised() {
        let id = Uuid::new_v4();
        assert_eq!(TenantKey::parse(&id.to_string()), Some(TenantKey::Id(id)));
        assert_eq!(
            TenantKey::parse(&id.to_string().to_uppercase()),
            Some(TenantKey::Id(id))
        );
        assert_eq!(
            TenantKey::parse("  Acme-Media "),
            Some(TenantKey::Slug("acme-media".into()))
        );
        assert_eq!(TenantKey::parse("acme media"), None);
        assert_eq!(TenantKey::parse("-acme"), None);
        assert_eq!(TenantKey::parse(&"a".repeat(64)), None);
    }

    #[test]
    fn subdomain_must_sit_directly_under_base() {
        let base = "cms.example.com";
        assert_eq!(subdomain("acme.cms.example.com", base).as_deref(), Some("acme"));
        assert_eq!(
            subdomain("ACME.cms.example.com:8443", base).as_deref(),
            Some("acme")
        );
        assert_eq!(subdomain("cms.example.com", base), None);
        assert_eq!(subdomain("a.b.cms.example.com", base), None);
        assert_eq!(subdomain("acmecms.example.com", base), None);
        assert_eq!(subdomain("acme.other.com", base), None);
    }
}
