//! API Layer
//!
//! REST endpoints for the platform: auth, participant self-service,
//! moderation, public listings and health.

pub mod admin;
pub mod auth;
pub mod common;
pub mod middleware;
pub mod openapi;
pub mod participant;

use axum::{routing::get, Json, Router};

pub use common::*;
pub use middleware::{AppState, Authenticated, RateLimit};
pub use openapi::PlatformApiDoc;

pub use admin::{admin_router, public_router, AdminState};
pub use auth::{auth_router, AuthState, CookieSettings};
pub use participant::{participant_router, ParticipantState};

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn ready_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "READY"
    }))
}

/// `/health` and `/ready`
pub fn health_router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
}
