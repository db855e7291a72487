//! Service Layer
//!
//! Business logic for identity, sessions, registration, talk submission and
//! moderation.
//! Services return domain events; the notifier turns them into mail.

pub mod audit;
pub mod auth;
pub mod authorization;
pub mod moderation;
pub mod notifier;
pub mod password;
pub mod registration;
pub mod talk;
pub mod token;

pub use audit::AuditService;
pub use auth::{AuthConfig, AuthService, IssuedTokens};
pub use authorization::AuthContext;
pub use moderation::{ModerationService, SectionDetails, UserSummary};
pub use notifier::Notifier;
pub use password::{PasswordService, MIN_PASSWORD_LENGTH};
pub use registration::RegistrationService;
pub use talk::TalkService;
pub use token::{extract_bearer_token, hash_token, new_opaque_token, AccessTokenClaims, TokenService};
