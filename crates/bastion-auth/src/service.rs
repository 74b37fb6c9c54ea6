//! Identity login, refresh token rotation and logout.

use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::principal::Principal;
use bastion_core::models::session::CreateSession;
use bastion_core::models::user::{CreateUser, User, UserStatus};
use bastion_core::repository::{SessionRepository, UserRepository};
use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token::{self, TokenSigner, ValidatedClaims};

const USED_REFRESH_TOKEN: &str = "refresh token not found or already used";

#[derive(Debug)]
pub struct LoginInput {
    pub tenant_id: Uuid,
    pub username_or_email: String,
    pub password: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A freshly issued token pair.
#[derive(Debug)]
pub struct LoginOutput {
    pub access_token: String,
    /// Raw refresh token. Only its hash is stored.
    pub refresh_token: String,
    pub session_id: Uuid,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Debug)]
pub struct RefreshInput {
    pub tenant_id: Uuid,
    pub raw_refresh_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Where a new session's client metadata comes from.
struct Client {
    ip_address: Option<String>,
    user_agent: Option<String>,
}

fn require_active(user: &User) -> Result<(), AuthError> {
    match user.status {
        UserStatus::Active => Ok(()),
        UserStatus::Locked => Err(AuthError::AccountLocked),
        UserStatus::Inactive => Err(AuthError::AccountInactive),
        UserStatus::PendingVerification => Err(AuthError::AccountPendingVerification),
    }
}

/// Only a missing row means bad credentials; storage errors pass through.
fn not_found_as(err: BastionError, replacement: AuthError) -> BastionError {
    match err {
        BastionError::NotFound { .. } => replacement.into(),
        other => other,
    }
}

pub struct AuthService<U: UserRepository, S: SessionRepository> {
    users: U,
    sessions: S,
    signer: TokenSigner,
    config: AuthConfig,
}

impl<U: UserRepository, S: SessionRepository> AuthService<U, S> {
    /// Fails when the configured key pair cannot be parsed.
    pub fn new(users: U, sessions: S, config: AuthConfig) -> Result<Self, AuthError> {
        Ok(Self {
            users,
            sessions,
            signer: TokenSigner::from_config(&config)?,
            config,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create an identity after checking the password policy.
    pub async fn register(&self, input: CreateUser) -> BastionResult<User> {
        password::check_policy(&input.password, self.config.min_password_length)?;
        self.users.create(input).await
    }

    /// Authenticate with username or email plus password.
    #[instrument(skip_all, fields(tenant_id = %input.tenant_id))]
    pub async fn login(&self, input: LoginInput) -> BastionResult<LoginOutput> {
        let login = input.username_or_email.as_str();
        let user = match self.users.get_by_username(input.tenant_id, login).await {
            Err(BastionError::NotFound { .. }) => self
                .users
                .get_by_email(input.tenant_id, login)
                .await
                .map_err(|e| not_found_as(e, AuthError::InvalidCredentials))?,
            found => found?,
        };

        let pepper = self.config.pepper.as_deref();
        if !password::verify_password(&input.password, &user.password_hash, pepper)? {
            warn!("Login rejected: bad password");
            return Err(AuthError::InvalidCredentials.into());
        }
        require_active(&user)?;

        let client = Client {
            ip_address: input.ip_address,
            user_agent: input.user_agent,
        };
        let output = self.start_session(&user, client).await?;
        info!(user_id = %user.id, "Login succeeded");
        Ok(output)
    }

    /// Rotate a refresh token. Each refresh token works once: its session
    /// is removed before a new one is created.
    #[instrument(skip_all, fields(tenant_id = %input.tenant_id))]
    pub async fn refresh(&self, input: RefreshInput) -> BastionResult<LoginOutput> {
        let token_hash = token::hash_refresh_token(&input.raw_refresh_token);
        let session = self
            .sessions
            .get_by_token_hash(input.tenant_id, &token_hash)
            .await
            .map_err(|e| {
                not_found_as(e, AuthError::TokenInvalid(USED_REFRESH_TOKEN.into()))
            })?;

        let expired = session.is_expired_at(Utc::now());
        // Removing the session consumes the token; a concurrent refresh
        // that loses the race finds nothing left to remove.
        let removed = self.sessions.invalidate(input.tenant_id, session.id).await;
        if expired {
            if let Err(e) = removed {
                warn!(session_id = %session.id, error = %e, "Failed to remove expired session");
            }
            return Err(AuthError::TokenExpired.into());
        }
        if !removed? {
            warn!(session_id = %session.id, "Refresh token already used");
            return Err(AuthError::TokenInvalid(USED_REFRESH_TOKEN.into()).into());
        }

        let user = self.users.get_by_id(input.tenant_id, session.user_id).await?;
        require_active(&user)?;

        let client = Client {
            ip_address: input.ip_address,
            user_agent: input.user_agent,
        };
        self.start_session(&user, client).await
    }

    /// Verify an access token and return its claims.
    pub fn validate_access_token(&self, token: &str) -> BastionResult<ValidatedClaims> {
        Ok(self.signer.verify(token)?)
    }

    /// Ends a session. Logging out of a session that is already gone is
    /// not an error.
    pub async fn logout(&self, tenant_id: Uuid, session_id: Uuid) -> BastionResult<()> {
        self.sessions.invalidate(tenant_id, session_id).await?;
        Ok(())
    }

    pub async fn revoke_all_sessions(&self, tenant_id: Uuid, user_id: Uuid) -> BastionResult<()> {
        self.sessions.invalidate_user_sessions(tenant_id, user_id).await
    }

    async fn start_session(&self, user: &User, client: Client) -> BastionResult<LoginOutput> {
        let lifetimes = self.config.lifetimes;
        let refresh_ttl = chrono::Duration::from_std(lifetimes.refresh)
            .map_err(|e| BastionError::Internal(format!("refresh lifetime out of range: {e}")))?;
        let refresh_token = token::generate_refresh_token();

        let session = self
            .sessions
            .create(CreateSession {
                tenant_id: user.tenant_id,
                user_id: user.id,
                token_hash: token::hash_refresh_token(&refresh_token),
                ip_address: client.ip_address,
                user_agent: client.user_agent,
                expires_at: Utc::now() + refresh_ttl,
            })
            .await?;

        let principal = Principal::user(user.id, user.tenant_id, user.role_id);
        Ok(LoginOutput {
            access_token: self.signer.issue(&principal)?,
            refresh_token,
            session_id: session.id,
            expires_in: lifetimes.access.as_secs(),
        })
    }
}
