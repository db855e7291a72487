//! Authorization
//!
//! Role checks run against the roles embedded in the access token. They are
//! not re-read from the store, so a revoked role stays effective until the
//! token expires.

use uuid::Uuid;

use crate::domain::{has_role, Role};
use crate::error::{PlatformError, Result};
use crate::service::token::AccessTokenClaims;

/// Identity of the caller for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
}

impl AuthContext {
    pub fn from_claims(claims: AccessTokenClaims) -> Self {
        Self {
            user_id: claims.uid,
            roles: claims.roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        has_role(&self.roles, role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(PlatformError::forbidden(format!("{} role required", role)))
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        self.require_role(Role::Admin)
    }
}
