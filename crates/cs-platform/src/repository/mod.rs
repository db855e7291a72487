//! Repository Layer
//!
//! Storage contracts for every entity, with a PostgreSQL adapter and an
//! in-memory adapter used for development and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    AuditLog, EmailVerifyToken, Profile, PublicParticipant, RefreshSession, RoleAssignment,
    Section, Talk, TalkFilter, TalkOverview, TalkStatus, User, UserStatus, UserWithRoles,
};
use crate::error::Result;

pub use memory::InMemoryStore;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user with its initial role set and profile, all or nothing.
    /// A taken email surfaces as `PlatformError::Duplicate`.
    async fn create(&self, user: &User, roles: &[RoleAssignment], profile: &Profile) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserWithRoles>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserWithRoles>>;
    async fn list(&self) -> Result<Vec<UserWithRoles>>;
    /// Write the new status and return the one it replaced, in one step.
    /// `None` when the user does not exist.
    async fn set_status(&self, id: Uuid, status: UserStatus, now: DateTime<Utc>) -> Result<Option<UserStatus>>;
    async fn mark_email_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<()>;
    async fn set_password(&self, id: Uuid, password_hash: &str, now: DateTime<Utc>) -> Result<()>;
    /// Idempotent
    async fn assign_role(&self, id: Uuid, assignment: &RoleAssignment) -> Result<()>;
    async fn remove_role(&self, id: Uuid, assignment: &RoleAssignment) -> Result<()>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &RefreshSession) -> Result<()>;
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshSession>>;
    /// Revoke the session with this hash if it exists and is still live.
    async fn revoke_by_hash(&self, token_hash: &str, now: DateTime<Utc>) -> Result<()>;
    /// Revoke `old_id` and insert `next` as one unit. Fails `Unauthorized`
    /// when `old_id` was already revoked, so a replayed token cannot rotate
    /// twice.
    async fn rotate(&self, old_id: Uuid, next: &RefreshSession, now: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait EmailTokenRepository: Send + Sync {
    async fn create(&self, token: &EmailVerifyToken) -> Result<()>;
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<EmailVerifyToken>>;
    /// Stamp `used_at`; returns false if the token was already used.
    async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, user_id: Uuid) -> Result<Option<Profile>>;
    async fn upsert(&self, profile: &Profile) -> Result<()>;
    /// Profiles for the given users keyed by user id; users without one are
    /// absent from the map.
    async fn get_many(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, Profile>>;
    /// Approved users ordered by surname, then name.
    async fn list_approved_public(&self) -> Result<Vec<PublicParticipant>>;
}

#[async_trait]
pub trait TalkRepository: Send + Sync {
    /// Insert only if the speaker owns fewer than `limit` talks, checked
    /// and written atomically. Fails `TalkLimitReached` otherwise.
    async fn create_within_quota(&self, talk: &Talk, limit: i64) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Talk>>;
    /// Persist the speaker-editable fields and status.
    async fn update(&self, talk: &Talk) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn list_by_speaker(&self, speaker_id: Uuid) -> Result<Vec<Talk>>;
    async fn count_by_speaker(&self, speaker_id: Uuid) -> Result<i64>;
    /// Same contract as [`UserRepository::set_status`].
    async fn set_status(&self, id: Uuid, status: TalkStatus) -> Result<Option<TalkStatus>>;
    /// `None` clears the stored URL.
    async fn set_file_url(&self, id: Uuid, file_url: Option<&str>) -> Result<()>;
    async fn set_schedule(
        &self,
        id: Uuid,
        section_id: Option<Uuid>,
        schedule_time: Option<DateTime<Utc>>,
    ) -> Result<()>;
    async fn list_overview(&self, filter: &TalkFilter) -> Result<Vec<TalkOverview>>;
}

#[async_trait]
pub trait SectionRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Section>>;
    async fn get(&self, id: Uuid) -> Result<Option<Section>>;
    async fn create(&self, section: &Section) -> Result<()>;
    async fn responsible_emails(&self, section_id: Uuid) -> Result<Vec<String>>;
    /// Replace the whole responsible set in one step.
    async fn replace_responsibles(&self, section_id: Uuid, emails: &[String]) -> Result<()>;
}

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn insert(&self, log: &AuditLog) -> Result<()>;
    /// Newest first
    async fn recent(&self, limit: i64) -> Result<Vec<AuditLog>>;
}

/// Handles to every store, shared by the services.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub email_tokens: Arc<dyn EmailTokenRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub talks: Arc<dyn TalkRepository>,
    pub sections: Arc<dyn SectionRepository>,
    pub audit_logs: Arc<dyn AuditLogRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryStore::default()))
    }

    pub fn from_store(store: Arc<InMemoryStore>) -> Self {
        Self {
            users: store.clone(),
            sessions: store.clone(),
            email_tokens: store.clone(),
            profiles: store.clone(),
            talks: store.clone(),
            sections: store.clone(),
            audit_logs: store,
        }
    }

    /// PostgreSQL-backed repositories; creates missing tables first.
    pub async fn postgres(pool: sqlx::PgPool) -> Result<Self> {
        postgres::init_schema(&pool).await?;
        Ok(Self {
            users: Arc::new(postgres::PgUserRepository::new(pool.clone())),
            sessions: Arc::new(postgres::PgSessionRepository::new(pool.clone())),
            email_tokens: Arc::new(postgres::PgEmailTokenRepository::new(pool.clone())),
            profiles: Arc::new(postgres::PgProfileRepository::new(pool.clone())),
            talks: Arc::new(postgres::PgTalkRepository::new(pool.clone())),
            sections: Arc::new(postgres::PgSectionRepository::new(pool.clone())),
            audit_logs: Arc::new(postgres::PgAuditLogRepository::new(pool)),
        })
    }
}
