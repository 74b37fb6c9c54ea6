//! SurrealDB repository implementations.

mod audit;
mod query;
mod role;
mod session;
mod tenant;
mod user;

pub use audit::SurrealAuditLogRepository;
pub use role::SurrealRoleRepository;
pub use session::SurrealSessionRepository;
pub use tenant::SurrealTenantRepository;
pub use user::SurrealUserRepository;
