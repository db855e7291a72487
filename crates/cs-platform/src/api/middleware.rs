//! API Middleware
//!
//! Authentication extractor and per-client rate limiting for Axum.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::warn;

use crate::config::RateLimitConfig;
use crate::error::PlatformError;
use crate::service::{extract_bearer_token, AuthContext, TokenService};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Shared state the extractors read from request extensions
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
}

/// Extractor for authenticated requests.
///
/// Reads the access token from the `access_token` cookie, falling back to
/// an `Authorization: Bearer` header, and trusts the roles it carries.
pub struct Authenticated(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = PlatformError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let app_state = parts
            .extensions
            .get::<AppState>()
            .ok_or_else(|| PlatformError::internal("AppState not found"))?;

        let token = access_token(&parts.headers)
            .ok_or_else(|| PlatformError::unauthorized("missing access token"))?;

        let claims = app_state.tokens.verify_access_token(&token)?;
        Ok(Authenticated(AuthContext::from_claims(claims)))
    }
}

fn access_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .map(String::from)
}

/// Address the rate limiter keys on.
///
/// The socket peer is authoritative. `X-Forwarded-For` is read only when the
/// peer is one of `trusted_proxies`, walking hops from the right and taking
/// the first address that is not itself a trusted proxy.
pub fn client_ip(
    headers: &HeaderMap,
    connect: Option<&ConnectInfo<SocketAddr>>,
    trusted_proxies: &[IpAddr],
) -> IpAddr {
    let Some(ConnectInfo(peer)) = connect else {
        return IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    };
    let peer = peer.ip();
    if !trusted_proxies.contains(&peer) {
        return peer;
    }

    headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map_while(|hop| hop.trim().parse::<IpAddr>().ok())
        .find(|ip| !trusted_proxies.contains(ip))
        .unwrap_or(peer)
}

/// Per-IP request budget
#[derive(Clone)]
pub struct RateLimit {
    name: &'static str,
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    trusted_proxies: Arc<[IpAddr]>,
}

impl RateLimit {
    pub fn new(name: &'static str, config: RateLimitConfig, trusted_proxies: &[IpAddr]) -> Self {
        let per_minute = NonZeroU32::new(config.per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        Self {
            name,
            limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute).allow_burst(burst))),
            trusted_proxies: trusted_proxies.into(),
        }
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), PlatformError> {
        if self.limiter.check_key(&ip).is_err() {
            warn!(limit = self.name, ip = %ip, "Rate limit exceeded");
            return Err(PlatformError::RateLimited);
        }
        Ok(())
    }

    /// Charge the request against the client it came from.
    pub fn check_request(
        &self,
        headers: &HeaderMap,
        connect: Option<&ConnectInfo<SocketAddr>>,
    ) -> Result<(), PlatformError> {
        self.check(client_ip(headers, connect, &self.trusted_proxies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(access_token(&headers).as_deref(), Some("from-header"));

        headers.insert("cookie", HeaderValue::from_static("access_token=from-cookie; other=1"));
        assert_eq!(access_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_client_ip_ignores_forwarded_for_from_untrusted_peer() {
        let peer = ConnectInfo(SocketAddr::from(([198, 51, 100, 4], 4000)));
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));

        assert_eq!(client_ip(&headers, Some(&peer), &[]), IpAddr::from([198, 51, 100, 4]));
        assert_eq!(
            client_ip(&headers, Some(&peer), &[IpAddr::from([10, 0, 0, 1])]),
            IpAddr::from([198, 51, 100, 4])
        );
        assert_eq!(client_ip(&headers, None, &[]), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn test_client_ip_behind_trusted_proxy() {
        let proxy = IpAddr::from([10, 0, 0, 1]);
        let peer = ConnectInfo(SocketAddr::new(proxy, 4000));
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(&peer), &[proxy]), proxy);

        // a spoofed leftmost hop is skipped; the hop the proxy appended wins
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 203.0.113.7"));
        assert_eq!(client_ip(&headers, Some(&peer), &[proxy]), IpAddr::from([203, 0, 113, 7]));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(&peer), &[proxy]), IpAddr::from([203, 0, 113, 7]));

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(client_ip(&headers, Some(&peer), &[proxy]), proxy);
    }

    #[test]
    fn test_rate_limit_burst() {
        let limit = RateLimit::new("test", RateLimitConfig { per_minute: 1, burst: 2 }, &[]);
        let ip = IpAddr::from([192, 0, 2, 1]);
        assert!(limit.check(ip).is_ok());
        assert!(limit.check(ip).is_ok());
        assert!(matches!(limit.check(ip), Err(PlatformError::RateLimited)));
        assert!(limit.check(IpAddr::from([192, 0, 2, 2])).is_ok());
    }
}
