//! Permission checks.
//!
//! Pure functions over an already-loaded role. Nothing here touches
//! storage, so a check is safe to run on every request.

use std::fmt;

use bastion_core::models::capability::Capability;
use bastion_core::models::principal::Principal;
use bastion_core::models::role::Role;
use uuid::Uuid;

/// Why a check denied. Logged, never returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    CrossTenant,
    RoleNotFound,
    RoleMismatch,
    RoleOutOfTenant,
    NotGranted,
    UnknownCapability,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::CrossTenant => "cross_tenant",
            DenyReason::RoleNotFound => "role_not_found",
            DenyReason::RoleMismatch => "role_mismatch",
            DenyReason::RoleOutOfTenant => "role_out_of_tenant",
            DenyReason::NotGranted => "not_granted",
            DenyReason::UnknownCapability => "unknown_capability",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Decide whether `principal` may exercise `capability` in `tenant_id`.
///
/// `role` is the role looked up for `principal.role_id`, or `None` when
/// it does not exist. Superusers are allowed everything, but only in
/// their own tenant.
pub fn check(
    principal: &Principal,
    tenant_id: Uuid,
    capability: Capability,
    role: Option<&Role>,
) -> Decision {
    if principal.tenant_id != tenant_id {
        return Decision::Deny(DenyReason::CrossTenant);
    }
    let Some(role) = role else {
        return Decision::Deny(DenyReason::RoleNotFound);
    };
    if role.id != principal.role_id {
        return Decision::Deny(DenyReason::RoleMismatch);
    }
    if !role.usable_in(tenant_id) {
        return Decision::Deny(DenyReason::RoleOutOfTenant);
    }
    if role.is_superuser || role.grants(capability) {
        return Decision::Allow;
    }
    Decision::Deny(DenyReason::NotGranted)
}

/// [`check`] for a capability given by name.
pub fn check_named(
    principal: &Principal,
    tenant_id: Uuid,
    capability: &str,
    role: Option<&Role>,
) -> Decision {
    match capability.parse::<Capability>() {
        Ok(cap) => check(principal, tenant_id, cap, role),
        Err(_) => Decision::Deny(DenyReason::UnknownCapability),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_core::models::role::CapabilityMap;
    use chrono::Utc;

    fn role(tenant_id: Option<Uuid>, is_superuser: bool, grants: &[(Capability, bool)]) -> Role {
        Role {
            id: Uuid::new_v4(),
            tenant_id,
            name: "r".into(),
            description: String::new(),
            is_superuser,
            capabilities: grants.iter().copied().collect::<CapabilityMap>(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn holder(role: &Role, tenant_id: Uuid) -> Principal {
        Principal::user(Uuid::new_v4(), tenant_id, role.id)
    }

    #[test]
    fn granted_capability_is_allowed() {
        let tenant = Uuid::new_v4();
        let editor = role(Some(tenant), false, &[(Capability::Publish, true)]);
        let p = holder(&editor, tenant);
        assert_eq!(
            check(&p, tenant, Capability::Publish, Some(&editor)),
            Decision::Allow
        );
    }

    #[test]
    fn absent_and_false_entries_deny() {
        let tenant = Uuid::new_v4();
        let editor = role(
            Some(tenant),
            false,
            &[(Capability::Publish, true), (Capability::DeleteTenant, false)],
        );
        let p = holder(&editor, tenant);
        for cap in [Capability::DeleteTenant, Capability::ManageSeo] {
            assert_eq!(
                check(&p, tenant, cap, Some(&editor)),
                Decision::Deny(DenyReason::NotGranted)
            );
        }
    }

    #[test]
    fn cross_tenant_denies_for_every_capability() {
        let home = Uuid::new_v4();
        let owner = role(Some(home), true, &[]);
        let p = holder(&owner, home);
        let elsewhere = Uuid::new_v4();
        for cap in Capability::ALL {
            assert_eq!(
                check(&p, elsewhere, cap, Some(&owner)),
                Decision::Deny(DenyReason::CrossTenant)
            );
        }
    }

    #[test]
    fn superuser_is_allowed_everything_at_home() {
        let tenant = Uuid::new_v4();
        let owner = role(Some(tenant), true, &[(Capability::DeleteTenant, false)]);
        let p = holder(&owner, tenant);
        for cap in Capability::ALL {
            assert!(check(&p, tenant, cap, Some(&owner)).is_allowed());
        }
    }

    #[test]
    fn missing_or_mismatched_role_denies() {
        let tenant = Uuid::new_v4();
        let editor = role(Some(tenant), false, &[(Capability::Publish, true)]);
        let p = holder(&editor, tenant);
        assert_eq!(
            check(&p, tenant, Capability::Publish, None),
            Decision::Deny(DenyReason::RoleNotFound)
        );

        let other = role(Some(tenant), false, &[(Capability::Publish, true)]);
        assert_eq!(
            check(&p, tenant, Capability::Publish, Some(&other)),
            Decision::Deny(DenyReason::RoleMismatch)
        );
    }

    #[test]
    fn role_from_another_tenant_denies() {
        let tenant = Uuid::new_v4();
        let foreign = role(Some(Uuid::new_v4()), true, &[]);
        let p = holder(&foreign, tenant);
        assert_eq!(
            check(&p, tenant, Capability::Publish, Some(&foreign)),
            Decision::Deny(DenyReason::RoleOutOfTenant)
        );
    }

    #[test]
    fn global_role_applies_in_holder_tenant() {
        let tenant = Uuid::new_v4();
        let global = role(None, false, &[(Capability::ReadAudit, true)]);
        let p = holder(&global, tenant);
        assert!(check(&p, tenant, Capability::ReadAudit, Some(&global)).is_allowed());
    }

    #[test]
    fn unknown_capability_name_denies() {
        let tenant = Uuid::new_v4();
        let owner = role(Some(tenant), true, &[]);
        let p = holder(&owner, tenant);
        assert_eq!(
            check_named(&p, tenant, "launch_rockets", Some(&owner)),
            Decision::Deny(DenyReason::UnknownCapability)
        );
        assert!(check_named(&p, tenant, "publish", Some(&owner)).is_allowed());
    }
}
