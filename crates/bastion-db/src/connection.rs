//! Remote SurrealDB connection.

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::schema::{latest_version, run_migrations};

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// `host:port` of the WebSocket endpoint.
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials.
    pub username: String,
    pub password: String,
    /// Migrate the schema as part of [`DbManager::connect`].
    pub run_migrations: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "bastion".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
            run_migrations: true,
        }
    }
}

/// Owns the shared client. Repositories get clones of it via
/// [`DbManager::client`].
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let db = Surreal::new::<Ws>(config.url.as_str()).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;

        if config.run_migrations {
            run_migrations(&db).await?;
        }

        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            schema_version = latest_version(),
            "Connected to SurrealDB"
        );
        Ok(Self { db })
    }

    pub fn client(&self) -> Surreal<Client> {
        self.db.clone()
    }
}
