//! Auth API Endpoints
//!
//! - POST /auth/register - Create an account
//! - POST /auth/login - Password login, sets access and refresh cookies
//! - POST /auth/refresh - Rotate the refresh cookie
//! - POST /auth/logout - Revoke the refresh session, clear cookies
//! - GET /auth/verify-email - Consume an email verification token

use axum::{
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::common::{LangQuery, SuccessResponse};
use crate::api::middleware::{RateLimit, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::clock::Clock;
use crate::domain::{Role, UserStatus};
use crate::error::PlatformError;
use crate::service::{AuthService, IssuedTokens, Notifier};

/// Register request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response; the tokens themselves travel only in cookies
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: String,
    pub status: UserStatus,
    pub roles: Vec<Role>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyEmailQuery {
    pub token: Option<String>,
}

/// Attributes shared by both auth cookies
#[derive(Debug, Clone, Default)]
pub struct CookieSettings {
    pub secure: bool,
    pub domain: Option<String>,
}

impl CookieSettings {
    fn build(&self, name: &'static str, value: String, max_age_secs: i64) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::seconds(max_age_secs.max(0)))
            .build();
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }

    fn set_tokens(&self, jar: CookieJar, issued: &IssuedTokens, now: chrono::DateTime<chrono::Utc>) -> CookieJar {
        jar.add(self.build(
            ACCESS_COOKIE,
            issued.access_token.clone(),
            (issued.access_expires_at - now).num_seconds(),
        ))
        .add(self.build(
            REFRESH_COOKIE,
            issued.refresh_token.clone(),
            (issued.refresh_expires_at - now).num_seconds(),
        ))
    }

    fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.build(ACCESS_COOKIE, String::new(), 0))
            .add(self.build(REFRESH_COOKIE, String::new(), 0))
    }
}

/// Auth service state
#[derive(Clone)]
pub struct AuthState {
    pub auth: Arc<AuthService>,
    pub notifier: Notifier,
    pub clock: Arc<dyn Clock>,
    pub cookies: CookieSettings,
    pub login_limit: RateLimit,
    pub register_limit: RateLimit,
}

/// Register a new account
///
/// The account starts in WAITING with the USER role; a welcome email is
/// sent in the background.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    params(LangQuery),
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = SuccessResponse),
        (status = 400, description = "Invalid email or weak password"),
        (status = 409, description = "Email already registered"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn register(
    State(state): State<AuthState>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<LangQuery>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    state.register_limit.check_request(&headers, connect.as_ref())?;

    let (_, event) = state.auth.register(&req.email, &req.password, query.lang()).await?;
    // Detached; the response does not wait for delivery
    let _ = state.notifier.dispatch(event).await;

    Ok(Json(SuccessResponse::ok()))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn login(
    State(state): State<AuthState>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), PlatformError> {
    state.login_limit.check_request(&headers, connect.as_ref())?;

    let issued = state.auth.login(&req.email, &req.password).await?;
    let jar = state.cookies.set_tokens(jar, &issued, state.clock.now());

    Ok((
        jar,
        Json(LoginResponse {
            user_id: issued.user_id,
            email: issued.email,
            status: issued.status,
            roles: issued.roles,
        }),
    ))
}

/// Rotate the refresh cookie and issue a new access token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "Tokens rotated", body = SuccessResponse),
        (status = 401, description = "Missing, revoked or expired refresh token")
    )
)]
pub async fn refresh(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SuccessResponse>), PlatformError> {
    let raw = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PlatformError::unauthorized("missing refresh token"))?;

    let issued = state.auth.refresh(&raw).await?;
    let jar = state.cookies.set_tokens(jar, &issued, state.clock.now());
    Ok((jar, Json(SuccessResponse::ok())))
}

/// Logout
///
/// Always succeeds and clears both cookies.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out", body = SuccessResponse)
    )
)]
pub async fn logout(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> (CookieJar, Json<SuccessResponse>) {
    let raw = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    if let Err(e) = state.auth.logout(raw.as_deref()).await {
        tracing::warn!(error = %e, "Failed to revoke refresh session on logout");
    }
    (state.cookies.clear(jar), Json(SuccessResponse::ok()))
}

/// Confirm an email address
#[utoipa::path(
    get,
    path = "/auth/verify-email",
    tag = "auth",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = SuccessResponse),
        (status = 400, description = "Missing, used or expired token")
    )
)]
pub async fn verify_email(
    State(state): State<AuthState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    let token = query
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| PlatformError::validation("token required"))?;
    state.auth.verify_email(&token).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Create the auth router
pub fn auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/verify-email", get(verify_email))
        .with_state(state)
}
