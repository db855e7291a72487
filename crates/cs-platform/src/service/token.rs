//! Access and Refresh Credentials
//!
//! Access tokens are HS256 JWTs checked without touching storage. Refresh
//! tokens are opaque random strings; only their SHA-256 digest is stored.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::Role;
use crate::error::{PlatformError, Result};

/// Bytes of entropy in an opaque token.
const OPAQUE_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub uid: Uuid,
    pub roles: Vec<Role>,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(secret: &[u8], access_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
            clock,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Sign a token for `user_id` carrying `roles`; returns it with its expiry.
    pub fn sign_access_token(&self, user_id: Uuid, roles: &[Role]) -> Result<(String, DateTime<Utc>)> {
        let now = self.clock.now();
        let expires_at = now + self.access_ttl;
        let claims = AccessTokenClaims {
            uid: user_id,
            roles: roles.to_vec(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok((token, expires_at))
    }

    /// Check signature and payload, then expiry against the injected clock.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)?.claims;

        // exp has whole-second precision
        if self.clock.now().timestamp() > claims.exp {
            return Err(PlatformError::unauthorized("access token expired"));
        }
        Ok(claims)
    }
}

/// Generate a fresh opaque token; returns `(raw, hash)`.
pub fn new_opaque_token() -> (String, String) {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    let hash = hash_token(&raw);
    (raw, hash)
}

/// Storage digest of a raw opaque token.
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Extract the token from an `Authorization: Bearer ...` header value.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}
