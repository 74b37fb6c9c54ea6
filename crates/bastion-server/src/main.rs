//! Bastion server: wires storage, authentication and the access gate
//! together and runs background housekeeping until shutdown.

mod config;
mod maintenance;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bastion_auth::AuthService;
use bastion_db::DbManager;
use bastion_db::repository::{
    SurrealAuditLogRepository, SurrealRoleRepository, SurrealSessionRepository,
    SurrealTenantRepository, SurrealUserRepository,
};
use bastion_guard::{AccessGate, AuditRecorder, RoleCatalog, TenantResolver};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bastion=info".parse()?))
        .json()
        .init();

    info!("Starting Bastion");

    let config = ServerConfig::load()?;
    let auth_config = config.auth.load()?;

    let db = DbManager::connect(&config.database.to_db_config())
        .await
        .context("failed to connect to SurrealDB")?;
    let client = db.client();

    let catalog = Arc::new(
        RoleCatalog::load(SurrealRoleRepository::new(client.clone()))
            .await
            .context("failed to load role catalog")?,
    );
    let gate = AccessGate::new(
        TenantResolver::new(
            SurrealTenantRepository::new(client.clone()),
            config.resolver.clone(),
        ),
        Arc::clone(&catalog),
        AuditRecorder::new(SurrealAuditLogRepository::new(client.clone())),
        config.gate.clone(),
    );

    let users = match &auth_config.pepper {
        Some(pepper) => SurrealUserRepository::with_pepper(client.clone(), pepper.clone()),
        None => SurrealUserRepository::new(client.clone()),
    };
    let auth = AuthService::new(users, SurrealSessionRepository::new(client.clone()), auth_config)
        .context("failed to load JWT keys")?;

    let mut tasks = Vec::new();
    let maintenance = &config.maintenance;
    if maintenance.session_cleanup_interval_secs > 0 {
        tasks.push(maintenance::spawn_session_sweeper(
            SurrealSessionRepository::new(client.clone()),
            Duration::from_secs(maintenance.session_cleanup_interval_secs),
        ));
    }
    if maintenance.role_refresh_interval_secs > 0 {
        tasks.push(maintenance::spawn_catalog_refresher(
            Arc::clone(gate.catalog()),
            Duration::from_secs(maintenance.role_refresh_interval_secs),
        ));
    }

    info!(
        issuer = %auth.config().issuer,
        roles = catalog.snapshot()?.len(),
        audit_denials = config.gate.audit_denials,
        "Bastion ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    for task in tasks {
        task.abort();
    }
    gate.resolver().invalidate_all();
    info!("Bastion stopped");
    Ok(())
}
