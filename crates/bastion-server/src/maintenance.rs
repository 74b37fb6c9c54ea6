//! Background housekeeping: expired-session sweeps and role catalog
//! reloads.

use std::sync::Arc;
use std::time::Duration;

use bastion_core::repository::{RoleRepository, SessionRepository};
use bastion_guard::RoleCatalog;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Periodically remove expired sessions. The sweep is not scoped to a
/// tenant, so sessions of soft-deleted tenants are removed as well.
pub fn spawn_session_sweeper<S>(sessions: S, every: Duration) -> JoinHandle<()>
where
    S: SessionRepository + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match sessions.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Expired sessions swept"),
                Err(e) => warn!(error = %e, "Session sweep failed"),
            }
        }
    })
}

pub fn spawn_catalog_refresher<R>(catalog: Arc<RoleCatalog<R>>, every: Duration) -> JoinHandle<()>
where
    R: RoleRepository + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately and the catalog is already loaded.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = catalog.refresh().await {
                warn!(error = %e, "Role catalog refresh failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_core::models::session::CreateSession;
    use bastion_core::models::tenant::CreateTenant;
    use bastion_core::repository::TenantRepository;
    use bastion_db::repository::{SurrealSessionRepository, SurrealTenantRepository};
    use chrono::{Duration as ChronoDuration, Utc};
    use surrealdb::Surreal;
    use surrealdb::engine::local::Mem;
    use uuid::Uuid;

    #[tokio::test]
    async fn sweeper_reaches_soft_deleted_tenants() {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        bastion_db::run_migrations(&db).await.unwrap();

        let tenants = SurrealTenantRepository::new(db.clone());
        let sessions = SurrealSessionRepository::new(db.clone());

        let gone = tenants
            .create(CreateTenant {
                name: "Gone".into(),
                slug: "gone".into(),
                metadata: None,
            })
            .await
            .unwrap();
        sessions
            .create(CreateSession {
                tenant_id: gone.id,
                user_id: Uuid::new_v4(),
                token_hash: "stale".into(),
                ip_address: None,
                user_agent: None,
                expires_at: Utc::now() - ChronoDuration::seconds(60),
            })
            .await
            .unwrap();
        tenants.soft_delete(gone.id).await.unwrap();

        let task = spawn_session_sweeper(sessions.clone(), Duration::from_secs(3600));
        // The first tick fires immediately.
        for _ in 0..50 {
            if sessions.get_by_token_hash(gone.id, "stale").await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        task.abort();

        assert!(sessions.get_by_token_hash(gone.id, "stale").await.is_err());
    }
}
