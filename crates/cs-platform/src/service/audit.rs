//! Audit Service
//!
//! Records moderator mutations. Failures to write are logged and swallowed.

use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{AuditAction, AuditLog, ModerationStatus, Role};
use crate::repository::AuditLogRepository;
use crate::service::authorization::AuthContext;

#[derive(Clone)]
pub struct AuditService {
    repo: Arc<dyn AuditLogRepository>,
    clock: Arc<dyn Clock>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditLogRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn log_create(&self, auth: &AuthContext, entity_type: &str, entity_id: &str, description: impl Into<String>) {
        self.record(auth, AuditAction::Create, entity_type, entity_id, description).await
    }

    pub async fn log_update(&self, auth: &AuthContext, entity_type: &str, entity_id: &str, description: impl Into<String>) {
        self.record(auth, AuditAction::Update, entity_type, entity_id, description).await
    }

    pub async fn log_status_changed(
        &self,
        auth: &AuthContext,
        entity_type: &str,
        entity_id: Uuid,
        previous: ModerationStatus,
        status: ModerationStatus,
    ) {
        let desc = format!("Status changed from {} to {}", previous, status);
        self.record(auth, AuditAction::StatusChanged, entity_type, &entity_id.to_string(), desc)
            .await
    }

    pub async fn log_role_assigned(&self, auth: &AuthContext, user_id: Uuid, role: Role, section_id: Option<Uuid>) {
        let desc = match section_id {
            Some(sid) => format!("Assigned role '{}' for section {}", role, sid),
            None => format!("Assigned global role '{}'", role),
        };
        self.record(auth, AuditAction::RoleAssigned, "User", &user_id.to_string(), desc)
            .await
    }

    pub async fn log_role_unassigned(&self, auth: &AuthContext, user_id: Uuid, role: Role, section_id: Option<Uuid>) {
        let desc = match section_id {
            Some(sid) => format!("Removed role '{}' for section {}", role, sid),
            None => format!("Removed role '{}'", role),
        };
        self.record(auth, AuditAction::RoleUnassigned, "User", &user_id.to_string(), desc)
            .await
    }

    pub async fn log_config_changed(&self, auth: &AuthContext, entity_type: &str, entity_id: &str, description: impl Into<String>) {
        self.record(auth, AuditAction::ConfigChanged, entity_type, entity_id, description)
            .await
    }

    async fn record(
        &self,
        auth: &AuthContext,
        action: AuditAction,
        entity_type: &str,
        entity_id: &str,
        description: impl Into<String>,
    ) {
        let log = AuditLog::for_entity(action, entity_type, entity_id, description, self.clock.now())
            .with_actor(auth.user_id);

        info!(
            action = ?log.action,
            entity_type = %log.entity_type,
            entity_id = ?log.entity_id,
            actor_id = %auth.user_id,
            "Audit log recorded"
        );

        if let Err(e) = self.repo.insert(&log).await {
            error!(error = %e, "Failed to insert audit log");
        }
    }
}
