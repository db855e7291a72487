//! Platform Configuration
//!
//! Read once from the environment at process start.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CS_API_PORT` | `8084` | HTTP API port |
//! | `DATABASE_URL` | - | PostgreSQL DSN; in-memory store when unset |
//! | `APP_ENV` | `dev` | `prod` enables `Secure` cookies and requires `JWT_SECRET` |
//! | `APP_URL` | `http://localhost:5173` | Public site URL |
//! | `JWT_SECRET` | random in dev | HS256 signing secret |
//! | `ACCESS_TTL_MIN` | `15` | Access token lifetime, 1..=1440 minutes |
//! | `REFRESH_TTL_DAYS` | `30` | Refresh session lifetime, 1..=365 days |
//! | `VERIFY_EMAIL_TTL_HOURS` | `24` | Email verification token lifetime, 1..=720 hours |
//! | `COOKIE_DOMAIN` | - | Cookie domain |
//! | `ORGANIZER_EMAILS` | - | Comma-separated fallback organizer list |
//! | `MAIL_DRIVER` | `log` | `ses` or `log` |
//! | `MAIL_FROM` | `noreply@localhost` | Sender address |
//! | `MAIL_TIMEOUT_SECS` | `90` | Detached send timeout, clamped to 60..=120 |
//! | `CORS_ORIGINS` | `APP_URL` | Comma-separated allowed origins |
//! | `AUTH_RATE_PER_MIN` / `AUTH_RATE_BURST` | `30` / `10` | Per-IP login limit |
//! | `REGISTER_RATE_PER_MIN` / `REGISTER_RATE_BURST` | `10` / `5` | Per-IP register limit |
//! | `TRUSTED_PROXIES` | - | Comma-separated proxy IPs whose `X-Forwarded-For` is honoured |

use chrono::Duration;
use rand::RngCore;
use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::domain::normalize_recipients;
use crate::error::{PlatformError, Result};

const MIN_MAIL_TIMEOUT_SECS: u64 = 60;
const MAX_MAIL_TIMEOUT_SECS: u64 = 120;

const ACCESS_TTL_MINUTES: RangeInclusive<i64> = 1..=1440;
const REFRESH_TTL_DAYS: RangeInclusive<i64> = 1..=365;
const VERIFY_EMAIL_TTL_HOURS: RangeInclusive<i64> = 1..=720;

/// Outbound mail transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailDriver {
    Ses,
    Log,
}

impl FromStr for MailDriver {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ses" => Ok(Self::Ses),
            "log" | "" => Ok(Self::Log),
            other => Err(PlatformError::configuration(format!("Unknown MAIL_DRIVER: {}", other))),
        }
    }
}

/// Per-client request budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_minute: u32,
    pub burst: u32,
}

#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub api_port: u16,
    pub database_url: Option<String>,
    pub production: bool,
    pub app_url: String,
    pub jwt_secret: Vec<u8>,
    /// Set when `JWT_SECRET` was absent and a per-process secret was drawn.
    pub jwt_secret_generated: bool,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub verify_email_ttl: Duration,
    pub cookie_domain: Option<String>,
    pub organizer_emails: Vec<String>,
    pub mail_driver: MailDriver,
    pub mail_from: String,
    pub mail_timeout: std::time::Duration,
    pub cors_origins: Vec<String>,
    pub login_rate: RateLimitConfig,
    pub register_rate: RateLimitConfig,
    pub trusted_proxies: Vec<IpAddr>,
}

impl PlatformConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let env_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let env_or_parse = |key: &str, default: i64| -> Result<i64> {
            match get(key) {
                Some(v) => v
                    .parse()
                    .map_err(|_| PlatformError::configuration(format!("{} must be an integer, got '{}'", key, v))),
                None => Ok(default),
            }
        };

        let env_in_range = |key: &str, default: i64, range: RangeInclusive<i64>| -> Result<i64> {
            let value = env_or_parse(key, default)?;
            if !range.contains(&value) {
                return Err(PlatformError::configuration(format!(
                    "{} must be within {}..={}, got {}",
                    key,
                    range.start(),
                    range.end(),
                    value
                )));
            }
            Ok(value)
        };

        let production = env_or("APP_ENV", "dev").eq_ignore_ascii_case("prod");
        let app_url = env_or("APP_URL", "http://localhost:5173");

        let jwt_secret_generated = get("JWT_SECRET").is_none();
        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret.into_bytes(),
            None if production => {
                return Err(PlatformError::configuration("JWT_SECRET is required when APP_ENV=prod"));
            }
            None => {
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        };

        let api_port = u16::try_from(env_or_parse("CS_API_PORT", 8084)?)
            .map_err(|_| PlatformError::configuration("CS_API_PORT out of range"))?;

        let mail_timeout_secs = (env_or_parse("MAIL_TIMEOUT_SECS", 90)?.max(0) as u64)
            .clamp(MIN_MAIL_TIMEOUT_SECS, MAX_MAIL_TIMEOUT_SECS);

        let cors_origins = match get("CORS_ORIGINS") {
            Some(list) => split_list(&list),
            None => vec![app_url.clone()],
        };

        let trusted_proxies = split_list(&env_or("TRUSTED_PROXIES", ""))
            .iter()
            .map(|entry| {
                entry.parse::<IpAddr>().map_err(|_| {
                    PlatformError::configuration(format!("TRUSTED_PROXIES entry is not an IP address: '{}'", entry))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let rate = |per_key: &str, per_default: i64, burst_key: &str, burst_default: i64| -> Result<RateLimitConfig> {
            Ok(RateLimitConfig {
                per_minute: env_or_parse(per_key, per_default)?.clamp(1, u32::MAX as i64) as u32,
                burst: env_or_parse(burst_key, burst_default)?.clamp(1, u32::MAX as i64) as u32,
            })
        };

        Ok(Self {
            api_port,
            database_url: get("DATABASE_URL"),
            production,
            app_url,
            jwt_secret,
            jwt_secret_generated,
            access_ttl: Duration::minutes(env_in_range("ACCESS_TTL_MIN", 15, ACCESS_TTL_MINUTES)?),
            refresh_ttl: Duration::days(env_in_range("REFRESH_TTL_DAYS", 30, REFRESH_TTL_DAYS)?),
            verify_email_ttl: Duration::hours(env_in_range("VERIFY_EMAIL_TTL_HOURS", 24, VERIFY_EMAIL_TTL_HOURS)?),
            cookie_domain: get("COOKIE_DOMAIN"),
            organizer_emails: normalize_recipients(split_list(&env_or("ORGANIZER_EMAILS", ""))),
            mail_driver: env_or("MAIL_DRIVER", "log").parse()?,
            mail_from: env_or("MAIL_FROM", "noreply@localhost"),
            mail_timeout: std::time::Duration::from_secs(mail_timeout_secs),
            cors_origins,
            login_rate: rate("AUTH_RATE_PER_MIN", 30, "AUTH_RATE_BURST", 10)?,
            register_rate: rate("REGISTER_RATE_PER_MIN", 10, "REGISTER_RATE_BURST", 5)?,
            trusted_proxies,
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
