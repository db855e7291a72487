//! ConfSite Platform Server
//!
//! Production server for the conference REST APIs:
//! - Auth: register, login, refresh, logout, email verification
//! - Participant: profile and talk submission
//! - Admin: user and talk moderation, sections, audit log
//!
//! Configuration is read from the environment; see
//! [`cs_platform::config`] for the full table. `RUST_LOG` controls log
//! verbosity (default `info`).

use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use cs_platform::api::PlatformApiDoc;
use cs_platform::clock::SystemClock;
use cs_platform::config::MailDriver;
use cs_platform::mail::{LogMailer, Mailer, SesMailer};
use cs_platform::repository::Repositories;
use cs_platform::{Platform, PlatformConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting ConfSite Platform Server");

    let config = PlatformConfig::from_env()?;
    if config.jwt_secret_generated {
        warn!("JWT_SECRET not set, using a random per-process secret");
    }

    // Storage
    let repos = match &config.database_url {
        Some(url) => {
            info!("Connecting to PostgreSQL");
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            Repositories::postgres(pool).await?
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            Repositories::in_memory()
        }
    };

    // Mail
    let mailer: Arc<dyn Mailer> = match config.mail_driver {
        MailDriver::Ses => {
            info!(from = %config.mail_from, "Using SES mailer");
            Arc::new(SesMailer::from_env(config.mail_from.clone()).await)
        }
        MailDriver::Log => {
            info!("Using log mailer");
            Arc::new(LogMailer)
        }
    };

    let platform = Platform::new(&config, repos, mailer, Arc::new(SystemClock));
    info!(
        organizers = config.organizer_emails.len(),
        secure_cookies = config.production,
        "Services initialized"
    );

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = platform
        .router()
        .merge(SwaggerUi::new("/swagger-ui").url("/q/openapi", PlatformApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let api_addr = format!("0.0.0.0:{}", config.api_port);
    info!("API server listening on http://{}", api_addr);
    let listener = TcpListener::bind(&api_addr).await?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ConfSite Platform Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received...");
}
