//! The access-control gate.
//!
//! Every mutating operation runs through [`Guard::execute`]: resolve the
//! tenant, check the capability against the caller's role, run the
//! operation, then commit its staged write together with the audit
//! entry. A failure at any step rejects the request and persists
//! nothing.

use std::future::Future;
use std::sync::Arc;

use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::audit::{AuditLogEntry, AuditOutcome};
use bastion_core::models::capability::Capability;
use bastion_core::models::principal::Principal;
use bastion_core::models::tenant::Tenant;
use bastion_core::repository::{AuditLogWriter, RoleRepository, TenantRepository};
use tracing::{debug, info, instrument, warn};

use crate::catalog::RoleCatalog;
use crate::config::GateConfig;
use crate::context::{ActionDescriptor, GuardContext, GuardedMutation, RequestContext};
use crate::permission::{Decision, DenyReason, check, check_named};
use crate::recorder::AuditRecorder;
use crate::resolver::TenantResolver;
use crate::state::{GuardState, Lifecycle};

/// Capability requested by a guard, possibly given by an unknown name.
#[derive(Debug, Clone)]
enum Requested {
    Known(Capability),
    Unknown(String),
}

impl Requested {
    fn name(&self) -> &str {
        match self {
            Requested::Known(cap) => cap.as_str(),
            Requested::Unknown(name) => name,
        }
    }
}

pub struct AccessGate<T, R, W>
where
    T: TenantRepository,
    R: RoleRepository,
    W: AuditLogWriter,
{
    resolver: TenantResolver<T>,
    catalog: Arc<RoleCatalog<R>>,
    recorder: AuditRecorder<W>,
    config: GateConfig,
}

impl<T, R, W> AccessGate<T, R, W>
where
    T: TenantRepository,
    R: RoleRepository,
    W: AuditLogWriter,
{
    pub fn new(
        resolver: TenantResolver<T>,
        catalog: Arc<RoleCatalog<R>>,
        recorder: AuditRecorder<W>,
        config: GateConfig,
    ) -> Self {
        Self {
            resolver,
            catalog,
            recorder,
            config,
        }
    }

    pub fn resolver(&self) -> &TenantResolver<T> {
        &self.resolver
    }

    pub fn catalog(&self) -> &Arc<RoleCatalog<R>> {
        &self.catalog
    }

    /// A guard for one mutating operation requiring `capability`.
    pub fn guard(&self, capability: Capability) -> Guard<'_, T, R, W> {
        Guard {
            gate: self,
            requested: Requested::Known(capability),
        }
    }

    /// Like [`AccessGate::guard`] for a capability given by name. Unknown
    /// names are denied when the guard runs.
    pub fn guard_named(&self, capability: &str) -> Guard<'_, T, R, W> {
        let requested = match capability.parse::<Capability>() {
            Ok(cap) => Requested::Known(cap),
            Err(_) => Requested::Unknown(capability.to_string()),
        };
        Guard {
            gate: self,
            requested,
        }
    }

    /// Resolve and authorize without running a mutation. Meant for reads
    /// that still require a capability, such as audit queries.
    #[instrument(skip_all, fields(%capability))]
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        capability: Capability,
    ) -> BastionResult<GuardContext> {
        let principal = require_principal(ctx)?;
        let tenant = self.resolver.resolve(ctx).await?;
        let capability = self
            .authorize_principal(&principal, &tenant, &Requested::Known(capability), ctx)
            .await?;
        Ok(GuardContext {
            tenant,
            principal,
            capability,
        })
    }

    async fn authorize_principal(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        requested: &Requested,
        ctx: &RequestContext,
    ) -> BastionResult<Capability> {
        let snapshot = self.catalog.snapshot()?;
        let role = snapshot.get(principal.role_id);

        let decision = match requested {
            Requested::Known(cap) => check(principal, tenant.id, *cap, role),
            Requested::Unknown(name) => check_named(principal, tenant.id, name, role),
        };

        let reason = match (decision, requested) {
            (Decision::Allow, Requested::Known(cap)) => return Ok(*cap),
            (Decision::Deny(reason), _) => reason,
            (Decision::Allow, Requested::Unknown(_)) => DenyReason::UnknownCapability,
        };
        Err(self.deny(principal, tenant, requested, reason, ctx).await)
    }

    async fn deny(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        requested: &Requested,
        reason: DenyReason,
        ctx: &RequestContext,
    ) -> BastionError {
        warn!(
            actor_id = %principal.actor_id,
            tenant_id = %tenant.id,
            capability = requested.name(),
            %reason,
            "Permission denied"
        );

        if self.config.audit_denials {
            let entry = AuditRecorder::<W>::entry(
                principal,
                tenant.id,
                ActionDescriptor::new(requested.name(), "capability"),
                AuditOutcome::Denied,
                ctx.ip_address.clone(),
            );
            if let Err(e) = self.recorder.record(entry).await {
                warn!(error = %e, "Failed to record permission denial");
            }
        }

        BastionError::PermissionDenied
    }
}

fn require_principal(ctx: &RequestContext) -> BastionResult<Principal> {
    ctx.principal
        .clone()
        .ok_or_else(|| BastionError::AuthenticationFailed {
            reason: "request is not authenticated".into(),
        })
}

/// One pending guarded operation. Consumed by [`Guard::execute`].
pub struct Guard<'g, T, R, W>
where
    T: TenantRepository,
    R: RoleRepository,
    W: AuditLogWriter,
{
    gate: &'g AccessGate<T, R, W>,
    requested: Requested,
}

impl<T, R, W> Guard<'_, T, R, W>
where
    T: TenantRepository,
    R: RoleRepository,
    W: AuditLogWriter,
{
    /// Run `operation` under this guard.
    ///
    /// On success the staged write has been applied and exactly one
    /// audit entry written in the same transaction; that entry is
    /// returned. On any error nothing has been persisted, except a
    /// `Denied` row when denial auditing is on.
    #[instrument(skip_all, fields(capability = self.requested.name()))]
    pub async fn execute<F, Fut>(
        self,
        ctx: &RequestContext,
        operation: F,
    ) -> BastionResult<AuditLogEntry>
    where
        F: FnOnce(GuardContext) -> Fut,
        Fut: Future<Output = BastionResult<GuardedMutation>>,
    {
        let mut lifecycle = Lifecycle::new();
        let result = self.run(&mut lifecycle, ctx, operation).await;

        match &result {
            Ok(entry) => info!(
                audit_id = %entry.id,
                tenant_id = %entry.tenant_id,
                action = %entry.action,
                "Guarded mutation committed"
            ),
            Err(e) => {
                let at = lifecycle.state();
                lifecycle.reject();
                debug!(
                    capability = self.requested.name(),
                    failed_at = %at,
                    error = %e,
                    "Guarded mutation rejected"
                );
            }
        }
        result
    }

    async fn run<F, Fut>(
        &self,
        lifecycle: &mut Lifecycle,
        ctx: &RequestContext,
        operation: F,
    ) -> BastionResult<AuditLogEntry>
    where
        F: FnOnce(GuardContext) -> Fut,
        Fut: Future<Output = BastionResult<GuardedMutation>>,
    {
        let principal = require_principal(ctx)?;
        let tenant = self.gate.resolver.resolve(ctx).await?;
        lifecycle.advance();

        let capability = self
            .gate
            .authorize_principal(&principal, &tenant, &self.requested, ctx)
            .await?;
        lifecycle.advance();

        let tenant_id = tenant.id;
        let guard_ctx = GuardContext {
            tenant,
            principal: principal.clone(),
            capability,
        };
        lifecycle.advance();
        let mutation = operation(guard_ctx).await?;

        let entry = AuditRecorder::<W>::entry(
            &principal,
            tenant_id,
            mutation.action,
            AuditOutcome::Success,
            ctx.ip_address.clone(),
        );
        let written = self.gate.recorder.commit(mutation.write, entry).await?;

        let state = lifecycle.advance();
        debug_assert_eq!(state, GuardState::Audited);
        Ok(written)
    }
}
