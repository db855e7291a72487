//! Moderation Service
//!
//! Admin-side operations on users, talks and sections. Status changes report
//! a notification event only for the first decision out of WAITING.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{
    is_first_decision, is_section_admin_of, validate_responsibles, AuditLog, DomainEvent,
    ModerationStatus, PublicParticipant, Role, RoleAssignment, Section, TalkFilter,
    TalkOverview, UserStatus, UserWithRoles,
};
use crate::error::{PlatformError, Result};
use crate::repository::Repositories;
use crate::service::audit::AuditService;
use crate::service::authorization::AuthContext;
use crate::service::password::PasswordService;

const DEFAULT_AUDIT_LIMIT: i64 = 100;
const MAX_AUDIT_LIMIT: i64 = 500;

/// User row for the admin list
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub status: UserStatus,
    pub email_verified: bool,
    pub roles: Vec<RoleAssignment>,
    pub full_name: String,
    pub affiliation: String,
    pub city: String,
    pub created_at: DateTime<Utc>,
}

/// Section with its notification addresses
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionDetails {
    #[serde(flatten)]
    pub section: Section,
    pub responsibles: Vec<String>,
}

pub struct ModerationService {
    repos: Repositories,
    audit: AuditService,
    clock: Arc<dyn Clock>,
    passwords: PasswordService,
}

impl ModerationService {
    pub fn new(repos: Repositories, audit: AuditService, clock: Arc<dyn Clock>) -> Self {
        Self {
            repos,
            audit,
            clock,
            passwords: PasswordService::new(),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>> {
        let users = self.repos.users.list().await?;
        let ids: Vec<Uuid> = users.iter().map(|u| u.user.id).collect();
        let mut profiles = self.repos.profiles.get_many(&ids).await?;

        Ok(users
            .into_iter()
            .map(|account| {
                let profile = profiles.remove(&account.user.id).unwrap_or_default();
                UserSummary {
                    id: account.user.id,
                    email: account.user.email,
                    status: account.user.status,
                    email_verified: account.user.email_verified,
                    roles: account.roles,
                    full_name: profile.full_name(),
                    affiliation: profile.affiliation,
                    city: profile.city,
                    created_at: account.user.created_at,
                }
            })
            .collect())
    }

    pub async fn set_user_status(
        &self,
        auth: &AuthContext,
        user_id: Uuid,
        status: UserStatus,
    ) -> Result<Option<DomainEvent>> {
        let account = self
            .repos
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("User", user_id.to_string()))?;

        let previous = self
            .repos
            .users
            .set_status(user_id, status, self.clock.now())
            .await?
            .ok_or_else(|| PlatformError::not_found("User", user_id.to_string()))?;

        info!(user_id = %user_id, previous = %previous, status = %status, "User status changed");
        self.audit.log_status_changed(auth, "User", user_id, previous, status).await;

        Ok(is_first_decision(previous, status).then(|| DomainEvent::UserStatusDecided {
            user_id,
            email: account.user.email,
            status,
        }))
    }

    /// Replace a user's password with a random one and return it in clear.
    /// Live sessions are left alone.
    pub async fn reset_password(&self, auth: &AuthContext, user_id: Uuid) -> Result<String> {
        let password = self.passwords.generate_password();
        let hash = self.passwords.hash_password(&password)?;
        self.repos.users.set_password(user_id, &hash, self.clock.now()).await?;

        info!(user_id = %user_id, "Password reset by admin");
        self.audit
            .log_update(auth, "User", &user_id.to_string(), "Password reset")
            .await;
        Ok(password)
    }

    /// Grant SECTION_ADMIN for one section. Repeating a grant is a no-op.
    pub async fn assign_section_admin(&self, auth: &AuthContext, user_id: Uuid, section_id: Uuid) -> Result<()> {
        self.require_section(section_id).await?;
        let account = self.require_user(user_id).await?;
        if is_section_admin_of(&account.roles, section_id) {
            return Ok(());
        }

        let assignment = RoleAssignment::for_section(Role::SectionAdmin, section_id);
        self.repos.users.assign_role(user_id, &assignment).await?;
        self.audit
            .log_role_assigned(auth, user_id, Role::SectionAdmin, Some(section_id))
            .await;
        Ok(())
    }

    pub async fn remove_section_admin(&self, auth: &AuthContext, user_id: Uuid, section_id: Uuid) -> Result<()> {
        let assignment = RoleAssignment::for_section(Role::SectionAdmin, section_id);
        self.repos.users.remove_role(user_id, &assignment).await?;
        self.audit
            .log_role_unassigned(auth, user_id, Role::SectionAdmin, Some(section_id))
            .await;
        Ok(())
    }

    pub async fn list_talks(&self, filter: &TalkFilter) -> Result<Vec<TalkOverview>> {
        self.repos.talks.list_overview(filter).await
    }

    pub async fn set_talk_status(
        &self,
        auth: &AuthContext,
        talk_id: Uuid,
        status: ModerationStatus,
    ) -> Result<Option<DomainEvent>> {
        let talk = self
            .repos
            .talks
            .get(talk_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Talk", talk_id.to_string()))?;

        let previous = self
            .repos
            .talks
            .set_status(talk_id, status)
            .await?
            .ok_or_else(|| PlatformError::not_found("Talk", talk_id.to_string()))?;

        info!(talk_id = %talk_id, previous = %previous, status = %status, "Talk status changed");
        self.audit.log_status_changed(auth, "Talk", talk_id, previous, status).await;

        if !is_first_decision(previous, status) {
            return Ok(None);
        }
        match self.repos.users.find_by_id(talk.speaker_id).await? {
            Some(speaker) => Ok(Some(DomainEvent::TalkStatusDecided {
                talk_id,
                speaker_email: speaker.user.email,
                title: talk.title,
                status,
            })),
            None => {
                warn!(talk_id = %talk_id, speaker_id = %talk.speaker_id, "Speaker missing, no decision notice");
                Ok(None)
            }
        }
    }

    /// Assign a section and schedule slot; `None` clears either.
    pub async fn schedule_talk(
        &self,
        auth: &AuthContext,
        talk_id: Uuid,
        section_id: Option<Uuid>,
        schedule_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if let Some(section_id) = section_id {
            self.require_section(section_id).await?;
        }
        self.repos.talks.set_schedule(talk_id, section_id, schedule_time).await?;

        let desc = match (section_id, schedule_time) {
            (Some(s), Some(t)) => format!("Scheduled in section {} at {}", s, t.to_rfc3339()),
            (Some(s), None) => format!("Assigned to section {}", s),
            (None, Some(t)) => format!("Scheduled at {}", t.to_rfc3339()),
            (None, None) => "Cleared section and schedule".to_string(),
        };
        self.audit.log_update(auth, "Talk", &talk_id.to_string(), desc).await;
        Ok(())
    }

    /// Approved talks for the public program.
    pub async fn public_program(&self) -> Result<Vec<TalkOverview>> {
        self.repos.talks.list_overview(&TalkFilter::approved()).await
    }

    pub async fn public_participants(&self) -> Result<Vec<PublicParticipant>> {
        self.repos.profiles.list_approved_public().await
    }

    pub async fn list_sections(&self) -> Result<Vec<Section>> {
        self.repos.sections.list().await
    }

    pub async fn list_section_details(&self) -> Result<Vec<SectionDetails>> {
        let sections = self.repos.sections.list().await?;
        let mut out = Vec::with_capacity(sections.len());
        for section in sections {
            let responsibles = self.repos.sections.responsible_emails(section.id).await?;
            out.push(SectionDetails { section, responsibles });
        }
        Ok(out)
    }

    pub async fn create_section(
        &self,
        auth: &AuthContext,
        title_ru: &str,
        title_en: &str,
        sort_order: i32,
    ) -> Result<Section> {
        if title_ru.trim().is_empty() {
            return Err(PlatformError::validation("titleRu is required"));
        }
        let section = Section::new(title_ru.trim(), title_en.trim(), sort_order);
        self.repos.sections.create(&section).await?;
        self.audit
            .log_create(auth, "Section", &section.id.to_string(), format!("Created section '{}'", section.title_ru))
            .await;
        Ok(section)
    }

    /// Replace the responsible addresses of a section (at most three).
    pub async fn set_responsibles(&self, auth: &AuthContext, section_id: Uuid, emails: &[String]) -> Result<Vec<String>> {
        let emails = validate_responsibles(emails)?;
        self.repos.sections.replace_responsibles(section_id, &emails).await?;
        self.audit
            .log_config_changed(
                auth,
                "Section",
                &section_id.to_string(),
                format!("Responsibles set to [{}]", emails.join(", ")),
            )
            .await;
        Ok(emails)
    }

    pub async fn recent_audit(&self, limit: Option<i64>) -> Result<Vec<AuditLog>> {
        let limit = limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT);
        self.repos.audit_logs.recent(limit).await
    }

    async fn require_section(&self, section_id: Uuid) -> Result<()> {
        match self.repos.sections.get(section_id).await? {
            Some(_) => Ok(()),
            None => Err(PlatformError::not_found("Section", section_id.to_string())),
        }
    }

    async fn require_user(&self, user_id: Uuid) -> Result<UserWithRoles> {
        self.repos
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("User", user_id.to_string()))
    }
}
