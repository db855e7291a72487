//! Authentication Service
//!
//! Registration, password login, refresh-token rotation, logout and email
//! verification. Every expiry check reads the injected clock.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{
    normalize_email, DomainEvent, EmailVerifyToken, Lang, Profile, RefreshSession, Role,
    RoleAssignment, User, UserStatus, UserWithRoles,
};
use crate::error::{PlatformError, Result};
use crate::repository::Repositories;
use crate::service::password::PasswordService;
use crate::service::token::{hash_token, new_opaque_token, TokenService};

/// Lifetimes of server-side credentials
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub refresh_ttl: Duration,
    pub verify_email_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_ttl: Duration::days(30),
            verify_email_ttl: Duration::hours(24),
        }
    }
}

/// Credentials handed out by login and refresh
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub user_id: Uuid,
    pub email: String,
    pub status: UserStatus,
    pub roles: Vec<Role>,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"))
}

fn invalid_credentials() -> PlatformError {
    PlatformError::unauthorized("invalid credentials")
}

pub struct AuthService {
    repos: Repositories,
    passwords: PasswordService,
    tokens: Arc<TokenService>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(
        repos: Repositories,
        tokens: Arc<TokenService>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        Self {
            repos,
            passwords: PasswordService::new(),
            tokens,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create a WAITING account with the USER role and an empty profile.
    ///
    /// The address is marked verified straight away. The returned event
    /// carries the welcome notice.
    pub async fn register(&self, email: &str, password: &str, lang: Lang) -> Result<(User, DomainEvent)> {
        let email = normalize_email(email);
        if !email_pattern().is_match(&email) {
            return Err(PlatformError::validation("invalid email"));
        }
        self.passwords.check_policy(password)?;

        let hash = self.passwords.hash_password(password)?;
        let mut user = User::new(email, hash, self.clock.now());
        user.email_verified = true;

        self.repos
            .users
            .create(&user, &[RoleAssignment::global(Role::User)], &Profile::empty(user.id))
            .await?;

        info!(user_id = %user.id, "User registered");

        let event = DomainEvent::UserRegistered {
            user_id: user.id,
            email: user.email.clone(),
            lang,
        };
        Ok((user, event))
    }

    /// Password login. Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedTokens> {
        let account = self
            .repos
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid_credentials)?;

        if !self.passwords.verify_password(password, &account.user.password_hash) {
            debug!(user_id = %account.user.id, "Password mismatch");
            return Err(invalid_credentials());
        }

        let (raw, hash) = new_opaque_token();
        let session = RefreshSession::new(account.user.id, hash, self.clock.now(), self.config.refresh_ttl);
        let issued = self.issue(&account, raw, &session)?;
        self.repos.sessions.create(&session).await?;

        info!(user_id = %account.user.id, "User logged in");
        Ok(issued)
    }

    /// Exchange a refresh token for a new pair, revoking the presented one.
    ///
    /// Roles are resolved again from current state. A token that was already
    /// rotated, revoked or expired is rejected.
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<IssuedTokens> {
        let now = self.clock.now();
        let session = self
            .repos
            .sessions
            .find_by_hash(&hash_token(raw_refresh_token))
            .await?
            .ok_or_else(|| PlatformError::unauthorized("unknown refresh token"))?;

        if session.is_revoked() {
            warn!(user_id = %session.user_id, session_id = %session.id, "Revoked refresh token presented");
            return Err(PlatformError::unauthorized("refresh token revoked"));
        }
        if session.is_expired(now) {
            return Err(PlatformError::unauthorized("refresh token expired"));
        }

        let account = self
            .repos
            .users
            .find_by_id(session.user_id)
            .await?
            .ok_or_else(|| PlatformError::unauthorized("user no longer exists"))?;

        let (raw, hash) = new_opaque_token();
        let next = RefreshSession::new(account.user.id, hash, now, self.config.refresh_ttl);
        let issued = self.issue(&account, raw, &next)?;
        self.repos.sessions.rotate(session.id, &next, now).await?;

        debug!(user_id = %account.user.id, "Refresh token rotated");
        Ok(issued)
    }

    /// Revoke the session behind `raw_refresh_token`. Unknown tokens are fine.
    pub async fn logout(&self, raw_refresh_token: Option<&str>) -> Result<()> {
        match raw_refresh_token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(raw) => {
                self.repos
                    .sessions
                    .revoke_by_hash(&hash_token(raw), self.clock.now())
                    .await
            }
            None => Ok(()),
        }
    }

    /// Create a single-use verification token and return its raw value.
    pub async fn issue_email_verification(&self, user_id: Uuid) -> Result<String> {
        if self.repos.users.find_by_id(user_id).await?.is_none() {
            return Err(PlatformError::not_found("User", user_id.to_string()));
        }
        let (raw, hash) = new_opaque_token();
        let token = EmailVerifyToken::new(user_id, hash, self.clock.now(), self.config.verify_email_ttl);
        self.repos.email_tokens.create(&token).await?;
        Ok(raw)
    }

    pub async fn verify_email(&self, raw_token: &str) -> Result<()> {
        let now = self.clock.now();
        let token = self
            .repos
            .email_tokens
            .find_by_hash(&hash_token(raw_token.trim()))
            .await?
            .filter(|t| t.is_usable(now))
            .ok_or_else(|| PlatformError::validation("invalid or expired token"))?;

        if !self.repos.email_tokens.mark_used(token.id, now).await? {
            return Err(PlatformError::validation("invalid or expired token"));
        }
        self.repos.users.mark_email_verified(token.user_id, now).await?;

        info!(user_id = %token.user_id, "Email verified");
        Ok(())
    }

    /// Current account with roles resolved from stored state.
    pub async fn current_user(&self, user_id: Uuid) -> Result<(User, Vec<Role>)> {
        let account = self
            .repos
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("User", user_id.to_string()))?;
        let roles = account.effective_roles();
        Ok((account.user, roles))
    }

    fn issue(&self, account: &UserWithRoles, raw_refresh: String, session: &RefreshSession) -> Result<IssuedTokens> {
        let roles = account.effective_roles();
        let (access_token, access_expires_at) = self.tokens.sign_access_token(account.user.id, &roles)?;
        Ok(IssuedTokens {
            user_id: account.user.id,
            email: account.user.email.clone(),
            status: account.user.status,
            roles,
            access_token,
            access_expires_at,
            refresh_token: raw_refresh,
            refresh_expires_at: session.expires_at,
        })
    }
}
