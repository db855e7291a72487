//! User, Role and Profile Entities
//!
//! Identity model: a user holds stored role assignments (global or scoped
//! to a section) and a moderation status. `PARTICIPANT` is never stored; it
//! is derived from the status whenever credentials are issued.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::PlatformError;

/// Moderation status shared by users and talks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationStatus {
    Waiting,
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl Default for ModerationStatus {
    fn default() -> Self {
        Self::Waiting
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationStatus {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "WAITING" => Ok(Self::Waiting),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(PlatformError::validation(format!("Invalid status: {}", s))),
        }
    }
}

pub type UserStatus = ModerationStatus;

/// Role codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    /// Derived from `APPROVED` status, never persisted
    Participant,
    Admin,
    SectionAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Participant => "PARTICIPANT",
            Self::Admin => "ADMIN",
            Self::SectionAdmin => "SECTION_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Self::User),
            "PARTICIPANT" => Ok(Self::Participant),
            "ADMIN" => Ok(Self::Admin),
            "SECTION_ADMIN" => Ok(Self::SectionAdmin),
            _ => Err(PlatformError::validation(format!("Unknown role: {}", s))),
        }
    }
}

/// A stored role, optionally scoped to one section (`None` = global).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<Uuid>,
}

impl RoleAssignment {
    pub fn global(role: Role) -> Self {
        Self { role, section_id: None }
    }

    pub fn for_section(role: Role, section_id: Uuid) -> Self {
        Self {
            role,
            section_id: Some(section_id),
        }
    }
}

/// Compute the effective role list carried in an access token.
///
/// Stored roles keep their order and appear once each; `PARTICIPANT` is
/// appended when the user is approved.
pub fn resolve_roles(stored: &[RoleAssignment], status: UserStatus) -> Vec<Role> {
    let mut roles: Vec<Role> = Vec::with_capacity(stored.len() + 1);
    for assignment in stored {
        if !roles.contains(&assignment.role) {
            roles.push(assignment.role);
        }
    }
    if status == UserStatus::Approved && !roles.contains(&Role::Participant) {
        roles.push(Role::Participant);
    }
    roles
}

pub fn has_role(roles: &[Role], needed: Role) -> bool {
    roles.contains(&needed)
}

pub fn is_section_admin_of(assignments: &[RoleAssignment], section_id: Uuid) -> bool {
    assignments
        .iter()
        .any(|a| a.role == Role::SectionAdmin && a.section_id == Some(section_id))
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_verified: bool,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            email_verified: false,
            status: UserStatus::Waiting,
            created_at: now,
            updated_at: now,
        }
    }
}

/// User together with stored role assignments
#[derive(Debug, Clone)]
pub struct UserWithRoles {
    pub user: User,
    pub roles: Vec<RoleAssignment>,
}

impl UserWithRoles {
    pub fn effective_roles(&self) -> Vec<Role> {
        resolve_roles(&self.roles, self.user.status)
    }
}

/// Normalise an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Participant profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(skip_deserializing)]
    pub user_id: Uuid,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub patronymic: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub affiliation: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub postal_address: String,
    #[serde(default)]
    pub consent_data_processing: bool,
    #[serde(default)]
    pub consent_data_transfer: bool,
}

impl Profile {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    pub fn full_name(&self) -> String {
        [self.surname.trim(), self.name.trim(), self.patronymic.trim()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What the public participants list shows about an approved user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicParticipant {
    pub full_name: String,
    pub affiliation: String,
    pub city: String,
}

impl From<&Profile> for PublicParticipant {
    fn from(profile: &Profile) -> Self {
        Self {
            full_name: profile.full_name(),
            affiliation: profile.affiliation.clone(),
            city: profile.city.clone(),
        }
    }
}
