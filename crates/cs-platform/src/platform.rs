//! Service Wiring
//!
//! Builds every service from configuration, a set of repositories, a mailer
//! and a clock, and assembles the HTTP router on top of them.

use axum::{Extension, Router};
use std::sync::Arc;

use crate::api::{
    admin_router, auth_router, health_router, participant_router, public_router, AdminState,
    AppState, AuthState, CookieSettings, ParticipantState, RateLimit,
};
use crate::clock::Clock;
use crate::config::PlatformConfig;
use crate::mail::{Mailer, Templates};
use crate::repository::Repositories;
use crate::service::{
    AuditService, AuthConfig, AuthService, ModerationService, Notifier, RegistrationService,
    TalkService, TokenService,
};

#[derive(Clone)]
pub struct Platform {
    pub repos: Repositories,
    pub clock: Arc<dyn Clock>,
    pub tokens: Arc<TokenService>,
    pub auth: Arc<AuthService>,
    pub talks: Arc<TalkService>,
    pub registration: Arc<RegistrationService>,
    pub moderation: Arc<ModerationService>,
    pub notifier: Notifier,
    cookies: CookieSettings,
    login_limit: RateLimit,
    register_limit: RateLimit,
}

impl Platform {
    pub fn new(
        config: &PlatformConfig,
        repos: Repositories,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(&config.jwt_secret, config.access_ttl, clock.clone()));
        let auth = Arc::new(AuthService::new(
            repos.clone(),
            tokens.clone(),
            clock.clone(),
            AuthConfig {
                refresh_ttl: config.refresh_ttl,
                verify_email_ttl: config.verify_email_ttl,
            },
        ));
        let talks = Arc::new(TalkService::new(
            repos.clone(),
            clock.clone(),
            config.organizer_emails.clone(),
        ));
        let registration = Arc::new(RegistrationService::new(repos.clone(), config.organizer_emails.clone()));
        let audit = AuditService::new(repos.audit_logs.clone(), clock.clone());
        let moderation = Arc::new(ModerationService::new(repos.clone(), audit, clock.clone()));
        let notifier = Notifier::new(mailer, Templates::new(config.app_url.clone()), config.mail_timeout);

        Self {
            repos,
            clock,
            tokens,
            auth,
            talks,
            registration,
            moderation,
            notifier,
            cookies: CookieSettings {
                secure: config.production,
                domain: config.cookie_domain.clone(),
            },
            login_limit: RateLimit::new("login", config.login_rate, &config.trusted_proxies),
            register_limit: RateLimit::new("register", config.register_rate, &config.trusted_proxies),
        }
    }

    /// All platform routes, without transport layers (tracing, CORS).
    pub fn router(&self) -> Router {
        let auth_state = AuthState {
            auth: self.auth.clone(),
            notifier: self.notifier.clone(),
            clock: self.clock.clone(),
            cookies: self.cookies.clone(),
            login_limit: self.login_limit.clone(),
            register_limit: self.register_limit.clone(),
        };
        let participant_state = ParticipantState {
            auth: self.auth.clone(),
            profiles: self.repos.profiles.clone(),
            talks: self.talks.clone(),
            registration: self.registration.clone(),
            notifier: self.notifier.clone(),
            register_limit: self.register_limit.clone(),
        };
        let admin_state = AdminState {
            moderation: self.moderation.clone(),
            notifier: self.notifier.clone(),
        };

        Router::new()
            .nest("/auth", auth_router(auth_state))
            .nest("/admin", admin_router(admin_state.clone()))
            .merge(participant_router(participant_state))
            .merge(public_router(admin_state))
            .merge(health_router())
            .layer(Extension(AppState {
                tokens: self.tokens.clone(),
            }))
    }
}
