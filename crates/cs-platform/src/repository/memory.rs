//! In-Memory Store
//!
//! Implements every repository contract behind one mutex. Used by the dev
//! server when no database is configured, and by tests. Each operation takes
//! the lock once, which gives the same atomicity the PostgreSQL adapter gets
//! from its transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{
    AuditLog, EmailVerifyToken, Profile, PublicParticipant, RefreshSession, RoleAssignment,
    Section, Talk, TalkFilter, TalkKind, TalkOverview, TalkStatus, User, UserStatus,
    UserWithRoles,
};
use crate::error::{PlatformError, Result};
use crate::repository::{
    AuditLogRepository, EmailTokenRepository, ProfileRepository, SectionRepository,
    SessionRepository, TalkRepository, UserRepository,
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Vec<RoleAssignment>>,
    sessions: HashMap<Uuid, RefreshSession>,
    email_tokens: HashMap<Uuid, EmailVerifyToken>,
    profiles: HashMap<Uuid, Profile>,
    talks: HashMap<Uuid, Talk>,
    sections: HashMap<Uuid, Section>,
    responsibles: HashMap<Uuid, Vec<String>>,
    audit_logs: Vec<AuditLog>,
}

impl State {
    fn with_roles(&self, user: &User) -> UserWithRoles {
        UserWithRoles {
            user: user.clone(),
            roles: self.roles.get(&user.id).cloned().unwrap_or_default(),
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All sessions ever issued for a user, revoked ones included.
    pub fn sessions_for(&self, user_id: Uuid) -> Vec<RefreshSession> {
        let state = self.state.lock();
        let mut out: Vec<RefreshSession> = state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.created_at);
        out
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create(&self, user: &User, roles: &[RoleAssignment], profile: &Profile) -> Result<()> {
        let mut state = self.state.lock();
        if state.users.values().any(|u| u.email == user.email) {
            return Err(PlatformError::duplicate("User", "email", &user.email));
        }
        state.users.insert(user.id, user.clone());
        state.roles.insert(user.id, roles.to_vec());
        state.profiles.insert(user.id, Profile { user_id: user.id, ..profile.clone() });
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserWithRoles>> {
        let state = self.state.lock();
        Ok(state.users.get(&id).map(|u| state.with_roles(u)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserWithRoles>> {
        let state = self.state.lock();
        Ok(state
            .users
            .values()
            .find(|u| u.email == email)
            .map(|u| state.with_roles(u)))
    }

    async fn list(&self) -> Result<Vec<UserWithRoles>> {
        let state = self.state.lock();
        let mut users: Vec<UserWithRoles> = state.users.values().map(|u| state.with_roles(u)).collect();
        users.sort_by(|a, b| b.user.created_at.cmp(&a.user.created_at));
        Ok(users)
    }

    async fn set_status(&self, id: Uuid, status: UserStatus, now: DateTime<Utc>) -> Result<Option<UserStatus>> {
        let mut state = self.state.lock();
        Ok(state.users.get_mut(&id).map(|user| {
            let previous = user.status;
            user.status = status;
            user.updated_at = now;
            previous
        }))
    }

    async fn mark_email_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock();
        match state.users.get_mut(&id) {
            Some(user) => {
                user.email_verified = true;
                user.updated_at = now;
                Ok(())
            }
            None => Err(PlatformError::not_found("User", id.to_string())),
        }
    }

    async fn set_password(&self, id: Uuid, password_hash: &str, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock();
        match state.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = now;
                Ok(())
            }
            None => Err(PlatformError::not_found("User", id.to_string())),
        }
    }

    async fn assign_role(&self, id: Uuid, assignment: &RoleAssignment) -> Result<()> {
        let mut state = self.state.lock();
        if !state.users.contains_key(&id) {
            return Err(PlatformError::not_found("User", id.to_string()));
        }
        let roles = state.roles.entry(id).or_default();
        if !roles.contains(assignment) {
            roles.push(assignment.clone());
        }
        Ok(())
    }

    async fn remove_role(&self, id: Uuid, assignment: &RoleAssignment) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(roles) = state.roles.get_mut(&id) {
            roles.retain(|r| r != assignment);
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn create(&self, session: &RefreshSession) -> Result<()> {
        self.state.lock().sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshSession>> {
        let state = self.state.lock();
        Ok(state.sessions.values().find(|s| s.token_hash == token_hash).cloned())
    }

    async fn revoke_by_hash(&self, token_hash: &str, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(session) = state
            .sessions
            .values_mut()
            .find(|s| s.token_hash == token_hash && s.revoked_at.is_none())
        {
            session.revoked_at = Some(now);
        }
        Ok(())
    }

    async fn rotate(&self, old_id: Uuid, next: &RefreshSession, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock();
        match state.sessions.get_mut(&old_id) {
            Some(old) if old.revoked_at.is_none() => old.revoked_at = Some(now),
            _ => return Err(PlatformError::unauthorized("refresh session already used")),
        }
        state.sessions.insert(next.id, next.clone());
        Ok(())
    }
}

#[async_trait]
impl EmailTokenRepository for InMemoryStore {
    async fn create(&self, token: &EmailVerifyToken) -> Result<()> {
        self.state.lock().email_tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<EmailVerifyToken>> {
        let state = self.state.lock();
        Ok(state.email_tokens.values().find(|t| t.token_hash == token_hash).cloned())
    }

    async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock();
        match state.email_tokens.get_mut(&id) {
            Some(token) if token.used_at.is_none() => {
                token.used_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn get(&self, user_id: Uuid) -> Result<Option<Profile>> {
        Ok(self.state.lock().profiles.get(&user_id).cloned())
    }

    async fn upsert(&self, profile: &Profile) -> Result<()> {
        self.state.lock().profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn get_many(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, Profile>> {
        let state = self.state.lock();
        Ok(user_ids
            .iter()
            .filter_map(|id| state.profiles.get(id).map(|p| (*id, p.clone())))
            .collect())
    }

    async fn list_approved_public(&self) -> Result<Vec<PublicParticipant>> {
        let state = self.state.lock();
        let mut approved: Vec<&Profile> = state
            .profiles
            .values()
            .filter(|p| {
                state
                    .users
                    .get(&p.user_id)
                    .is_some_and(|u| u.status == UserStatus::Approved)
            })
            .collect();
        approved.sort_by(|a, b| a.surname.cmp(&b.surname).then_with(|| a.name.cmp(&b.name)));
        Ok(approved.into_iter().map(PublicParticipant::from).collect())
    }
}

#[async_trait]
impl TalkRepository for InMemoryStore {
    async fn create_within_quota(&self, talk: &Talk, limit: i64) -> Result<()> {
        let mut state = self.state.lock();
        let owned = state.talks.values().filter(|t| t.speaker_id == talk.speaker_id).count() as i64;
        if owned >= limit {
            return Err(PlatformError::TalkLimitReached { limit });
        }
        state.talks.insert(talk.id, talk.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Talk>> {
        Ok(self.state.lock().talks.get(&id).cloned())
    }

    async fn update(&self, talk: &Talk) -> Result<()> {
        let mut state = self.state.lock();
        match state.talks.get_mut(&talk.id) {
            Some(existing) => {
                existing.section_id = talk.section_id;
                existing.title = talk.title.clone();
                existing.affiliation = talk.affiliation.clone();
                existing.abstract_text = talk.abstract_text.clone();
                existing.kind = talk.kind;
                existing.authors = talk.authors.clone();
                existing.status = talk.status;
                Ok(())
            }
            None => Err(PlatformError::not_found("Talk", talk.id.to_string())),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.lock().talks.remove(&id).is_some())
    }

    async fn list_by_speaker(&self, speaker_id: Uuid) -> Result<Vec<Talk>> {
        let state = self.state.lock();
        let mut talks: Vec<Talk> = state
            .talks
            .values()
            .filter(|t| t.speaker_id == speaker_id)
            .cloned()
            .collect();
        talks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(talks)
    }

    async fn count_by_speaker(&self, speaker_id: Uuid) -> Result<i64> {
        let state = self.state.lock();
        Ok(state.talks.values().filter(|t| t.speaker_id == speaker_id).count() as i64)
    }

    async fn set_status(&self, id: Uuid, status: TalkStatus) -> Result<Option<TalkStatus>> {
        let mut state = self.state.lock();
        Ok(state.talks.get_mut(&id).map(|talk| {
            let previous = talk.status;
            talk.status = status;
            previous
        }))
    }

    async fn set_file_url(&self, id: Uuid, file_url: Option<&str>) -> Result<()> {
        let mut state = self.state.lock();
        match state.talks.get_mut(&id) {
            Some(talk) => {
                talk.file_url = file_url.map(String::from);
                Ok(())
            }
            None => Err(PlatformError::not_found("Talk", id.to_string())),
        }
    }

    async fn set_schedule(
        &self,
        id: Uuid,
        section_id: Option<Uuid>,
        schedule_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        match state.talks.get_mut(&id) {
            Some(talk) => {
                talk.section_id = section_id;
                talk.schedule_time = schedule_time;
                Ok(())
            }
            None => Err(PlatformError::not_found("Talk", id.to_string())),
        }
    }

    async fn list_overview(&self, filter: &TalkFilter) -> Result<Vec<TalkOverview>> {
        let state = self.state.lock();
        let mut talks: Vec<&Talk> = state
            .talks
            .values()
            .filter(|t| filter.section_id.map_or(true, |s| t.section_id == Some(s)))
            .filter(|t| !filter.only_plenary || t.kind == TalkKind::Plenary)
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .collect();
        talks.sort_by_key(|t| t.created_at);

        Ok(talks
            .into_iter()
            .map(|t| {
                let profile = state.profiles.get(&t.speaker_id);
                let section = t.section_id.and_then(|id| state.sections.get(&id));
                TalkOverview {
                    id: t.id,
                    title: t.title.clone(),
                    kind: t.kind,
                    status: t.status,
                    abstract_text: t.abstract_text.clone(),
                    authors: t.authors.clone(),
                    section_id: t.section_id,
                    section_title_ru: section.map(|s| s.title_ru.clone()),
                    section_title_en: section.map(|s| s.title_en.clone()),
                    schedule_time: t.schedule_time,
                    file_url: t.file_url.clone(),
                    speaker_full_name: profile.map(|p| p.full_name()).unwrap_or_default(),
                    speaker_city: profile.map(|p| p.city.clone()).unwrap_or_default(),
                    speaker_affiliation: profile.map(|p| p.affiliation.clone()).unwrap_or_default(),
                }
            })
            .collect())
    }
}

#[async_trait]
impl SectionRepository for InMemoryStore {
    async fn list(&self) -> Result<Vec<Section>> {
        let state = self.state.lock();
        let mut sections: Vec<Section> = state.sections.values().cloned().collect();
        sections.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.title_ru.cmp(&b.title_ru)));
        Ok(sections)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Section>> {
        Ok(self.state.lock().sections.get(&id).cloned())
    }

    async fn create(&self, section: &Section) -> Result<()> {
        self.state.lock().sections.insert(section.id, section.clone());
        Ok(())
    }

    async fn responsible_emails(&self, section_id: Uuid) -> Result<Vec<String>> {
        Ok(self.state.lock().responsibles.get(&section_id).cloned().unwrap_or_default())
    }

    async fn replace_responsibles(&self, section_id: Uuid, emails: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        if !state.sections.contains_key(&section_id) {
            return Err(PlatformError::not_found("Section", section_id.to_string()));
        }
        state.responsibles.insert(section_id, emails.to_vec());
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryStore {
    async fn insert(&self, log: &AuditLog) -> Result<()> {
        self.state.lock().audit_logs.push(log.clone());
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<AuditLog>> {
        let state = self.state.lock();
        Ok(state
            .audit_logs
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
