//! Request-scoped values passed explicitly through the gate.

use bastion_core::models::capability::Capability;
use bastion_core::models::principal::Principal;
use bastion_core::models::tenant::Tenant;
use bastion_core::repository::StagedWrite;

/// Name of the header carrying an explicit tenant.
pub const TENANT_HEADER: &str = "X-Tenant";

/// What the transport layer knows about an inbound request.
///
/// Every tenant source is the raw value as received; the resolver
/// decides which one wins.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Tenant named by the caller's credentials.
    pub tenant_claim: Option<String>,
    /// Value of the [`TENANT_HEADER`] header.
    pub tenant_header: Option<String>,
    /// Tenant path parameter, e.g. `/t/{tenant}/...`.
    pub path_tenant: Option<String>,
    /// `Host` header, possibly with a port.
    pub host: Option<String>,
    /// The authenticated caller, if any.
    pub principal: Option<Principal>,
    pub ip_address: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_tenant_claim(mut self, tenant: impl Into<String>) -> Self {
        self.tenant_claim = Some(tenant.into());
        self
    }

    pub fn with_tenant_header(mut self, tenant: impl Into<String>) -> Self {
        self.tenant_header = Some(tenant.into());
        self
    }

    pub fn with_path_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.path_tenant = Some(tenant.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }
}

/// Handed to a guarded operation once the caller is authorized.
#[derive(Debug, Clone)]
pub struct GuardContext {
    pub tenant: Tenant,
    pub principal: Principal,
    pub capability: Capability,
}

/// Describes a mutation for the audit trail.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    /// Action kind, e.g. `publish`.
    pub kind: String,
    /// Kind of entity acted on, e.g. `article`.
    pub target_type: String,
    pub target_id: Option<String>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

impl ActionDescriptor {
    pub fn new(kind: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target_type: target_type.into(),
            target_id: None,
            before: None,
            after: None,
        }
    }

    /// Action named after the capability that authorized it.
    pub fn for_capability(capability: Capability, target_type: impl Into<String>) -> Self {
        Self::new(capability.as_str(), target_type)
    }

    pub fn target_id(mut self, id: impl Into<String>) -> Self {
        self.target_id = Some(id.into());
        self
    }

    pub fn before(mut self, snapshot: serde_json::Value) -> Self {
        self.before = Some(snapshot);
        self
    }

    pub fn after(mut self, snapshot: serde_json::Value) -> Self {
        self.after = Some(snapshot);
        self
    }
}

/// What a guarded operation hands back: the write to apply and how to
/// describe it in the audit trail.
#[derive(Debug, Clone)]
pub struct GuardedMutation {
    pub action: ActionDescriptor,
    pub write: StagedWrite,
}

impl GuardedMutation {
    pub fn new(action: ActionDescriptor, write: StagedWrite) -> Self {
        Self { action, write }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_defaults_to_capability_name() {
        let action = ActionDescriptor::for_capability(Capability::Publish, "article")
            .target_id("a1")
            .after(json!({ "status": "published" }));
        assert_eq!(action.kind, "publish");
        assert_eq!(action.target_type, "article");
        assert_eq!(action.target_id.as_deref(), Some("a1"));
        assert!(action.before.is_none());
    }

    #[test]
    fn request_builder_sets_sources() {
        let ctx = RequestContext::new()
            .with_tenant_header("acme")
            .with_host("globex.example.com:8080");
        assert_eq!(ctx.tenant_header.as_deref(), Some("acme"));
        assert!(ctx.tenant_claim.is_none());
        assert!(ctx.principal.is_none());
    }
}
