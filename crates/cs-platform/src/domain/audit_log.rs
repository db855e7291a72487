//! Audit Log Entity
//!
//! Records moderator actions for later review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Audit action type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    StatusChanged,
    RoleAssigned,
    RoleUnassigned,
    ConfigChanged,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::StatusChanged => "STATUS_CHANGED",
            Self::RoleAssigned => "ROLE_ASSIGNED",
            Self::RoleUnassigned => "ROLE_UNASSIGNED",
            Self::ConfigChanged => "CONFIG_CHANGED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE" => Some(Self::Create),
            "UPDATE" => Some(Self::Update),
            "STATUS_CHANGED" => Some(Self::StatusChanged),
            "ROLE_ASSIGNED" => Some(Self::RoleAssigned),
            "ROLE_UNASSIGNED" => Some(Self::RoleUnassigned),
            "CONFIG_CHANGED" => Some(Self::ConfigChanged),
            _ => None,
        }
    }
}

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,

    pub action: AuditAction,

    /// Entity type affected (e.g. "User", "Talk", "Section")
    pub entity_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    pub description: String,

    /// User who performed the action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn for_entity(
        action: AuditAction,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            entity_type: entity_type.into(),
            entity_id: Some(entity_id.into()),
            description: description.into(),
            actor_id: None,
            created_at: now,
        }
    }

    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }
}
