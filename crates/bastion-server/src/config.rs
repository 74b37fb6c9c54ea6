//! Server configuration.
//!
//! Read from a TOML file (`bastion.toml`, or the path in
//! `BASTION_CONFIG`). Every section has defaults, so an empty file is
//! valid. Secrets may come from the environment instead of the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use bastion_auth::{AuthConfig, Lifetimes};
use bastion_db::DbConfig;
use bastion_guard::{GateConfig, ResolverConfig};
use serde::Deserialize;

pub const CONFIG_PATH_ENV: &str = "BASTION_CONFIG";
pub const DB_PASSWORD_ENV: &str = "BASTION_DB_PASSWORD";
pub const PEPPER_ENV: &str = "BASTION_PEPPER";

const DEFAULT_CONFIG_PATH: &str = "bastion.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub maintenance: MaintenanceSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub run_migrations: bool,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let db = DbConfig::default();
        Self {
            url: db.url,
            namespace: db.namespace,
            database: db.database,
            username: db.username,
            password: db.password,
            run_migrations: db.run_migrations,
        }
    }
}

impl DatabaseSection {
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig {
            url: self.url.clone(),
            namespace: self.namespace.clone(),
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            run_migrations: self.run_migrations,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// PEM file holding the Ed25519 signing key.
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub issuer: String,
    pub access_token_lifetime_secs: u64,
    pub refresh_token_lifetime_secs: u64,
    pub pepper: Option<String>,
    pub min_password_length: usize,
}

impl Default for AuthSection {
    fn default() -> Self {
        let auth = AuthConfig::default();
        Self {
            private_key_path: PathBuf::from("keys/jwt_private.pem"),
            public_key_path: PathBuf::from("keys/jwt_public.pem"),
            issuer: auth.issuer,
            access_token_lifetime_secs: auth.lifetimes.access.as_secs(),
            refresh_token_lifetime_secs: auth.lifetimes.refresh.as_secs(),
            pepper: auth.pepper,
            min_password_length: auth.min_password_length,
        }
    }
}

impl AuthSection {
    /// Build the runtime auth config, reading both key files.
    pub fn load(&self) -> anyhow::Result<AuthConfig> {
        Ok(AuthConfig {
            signing_key_pem: read_key(&self.private_key_path)?,
            verifying_key_pem: read_key(&self.public_key_path)?,
            issuer: self.issuer.clone(),
            lifetimes: Lifetimes {
                access: Duration::from_secs(self.access_token_lifetime_secs),
                refresh: Duration::from_secs(self.refresh_token_lifetime_secs),
            },
            pepper: self.pepper.clone(),
            min_password_length: self.min_password_length,
        })
    }
}

fn read_key(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {}", path.display()))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaintenanceSection {
    /// Seconds between expired-session sweeps. `0` disables the sweep.
    pub session_cleanup_interval_secs: u64,
    /// Seconds between role catalog reloads. `0` disables the reload.
    pub role_refresh_interval_secs: u64,
}

impl Default for MaintenanceSection {
    fn default() -> Self {
        Self {
            session_cleanup_interval_secs: 3600,
            role_refresh_interval_secs: 300,
        }
    }
}

impl ServerConfig {
    /// Load from `BASTION_CONFIG` or `bastion.toml`, then apply
    /// environment overrides. A missing default file yields defaults.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if explicit.is_none() && !path.exists() {
            Self::default()
        } else {
            Self::from_file(&path)?
        };

        if let Ok(password) = std::env::var(DB_PASSWORD_ENV) {
            config.database.password = password;
        }
        if let Ok(pepper) = std::env::var(PEPPER_ENV) {
            config.auth.pepper = Some(pepper);
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.resolver.cache_capacity > 0,
            "resolver.cache_capacity must be positive"
        );
        anyhow::ensure!(
            self.auth.access_token_lifetime_secs > 0 && self.auth.refresh_token_lifetime_secs > 0,
            "auth token lifetimes must be positive"
        );
        anyhow::ensure!(
            self.auth.min_password_length > 0,
            "auth.min_password_length must be positive"
        );
        if let Some(base) = &self.resolver.base_domain {
            anyhow::ensure!(
                !base.trim_matches('.').is_empty(),
                "resolver.base_domain must not be empty"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ServerConfig::parse("").unwrap();
        assert_eq!(config.database.namespace, "bastion");
        assert_eq!(config.auth.issuer, "bastion");
        assert_eq!(config.resolver.cache_ttl_secs, 30);
        assert!(!config.gate.audit_denials);
        assert_eq!(config.maintenance.session_cleanup_interval_secs, 3600);
    }

    #[test]
    fn sections_override_defaults() {
        let config = ServerConfig::parse(
            r#"
            [database]
            url = "db.internal:8000"
            password = "s3cret"

            [resolver]
            base_domain = "cms.example.com"
            default_tenant = "acme"

            [gate]
            audit_denials = true

            [maintenance]
            session_cleanup_interval_secs = 0
            "#,
        )
        .unwrap();

        let db = config.database.to_db_config();
        assert_eq!(db.url, "db.internal:8000");
        assert_eq!(db.password, "s3cret");
        assert_eq!(db.database, "main");
        assert_eq!(config.resolver.base_domain.as_deref(), Some("cms.example.com"));
        assert_eq!(config.resolver.cache_capacity, 10_000);
        assert!(config.gate.audit_denials);
        assert_eq!(config.maintenance.session_cleanup_interval_secs, 0);
        assert_eq!(config.maintenance.role_refresh_interval_secs, 300);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(ServerConfig::parse("[resolver]\ncache_capacity = 0").is_err());
        assert!(ServerConfig::parse("[resolver]\nbase_domain = \".\"").is_err());
        assert!(ServerConfig::parse("[gate]\naudit_denials = \"yes\"").is_err());
        assert!(ServerConfig::parse("[auth]\naccess_token_lifetime_secs = 0").is_err());
    }

    #[test]
    fn missing_key_file_is_reported() {
        let auth = AuthSection {
            private_key_path: PathBuf::from("/nonexistent/jwt_private.pem"),
            ..AuthSection::default()
        };
        let err = auth.load().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/jwt_private.pem"));
    }
}
