//! Bastion Guard: tenant resolution, capability checks and audited
//! mutations.
//!
//! A request passes through [`AccessGate`] before any mutation runs. The
//! gate resolves the active tenant ([`TenantResolver`]), checks the
//! caller's role from the in-process [`RoleCatalog`], and commits the
//! operation's staged write together with its audit entry
//! ([`AuditRecorder`]).

pub mod catalog;
pub mod config;
pub mod context;
pub mod gate;
pub mod permission;
pub mod recorder;
pub mod resolver;
pub mod state;

pub use catalog::{RoleCatalog, RoleSnapshot};
pub use config::{GateConfig, ResolverConfig};
pub use context::{ActionDescriptor, GuardContext, GuardedMutation, RequestContext, TENANT_HEADER};
pub use gate::{AccessGate, Guard};
pub use permission::{Decision, DenyReason};
pub use recorder::AuditRecorder;
pub use resolver::{TenantResolver, TenantSource};
pub use state::GuardState;
