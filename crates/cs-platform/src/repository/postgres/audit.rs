use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::{AuditAction, AuditLog};
use crate::error::{PlatformError, Result};
use crate::repository::AuditLogRepository;

pub struct PgAuditLogRepository {
    pool: PgPool,
}

impl PgAuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogRepository for PgAuditLogRepository {
    async fn insert(&self, log: &AuditLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, action, entity_type, entity_id, description, actor_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log.id)
        .bind(log.action.as_str())
        .bind(&log.entity_type)
        .bind(&log.entity_id)
        .bind(&log.description)
        .bind(log.actor_id)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<AuditLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, action, entity_type, entity_id, description, actor_id, created_at
            FROM audit_logs ORDER BY created_at DESC LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<AuditLog> {
                let action: String = row.try_get("action")?;
                Ok(AuditLog {
                    id: row.try_get("id")?,
                    action: AuditAction::parse(&action)
                        .ok_or_else(|| PlatformError::internal(format!("Unknown audit action: {}", action)))?,
                    entity_type: row.try_get("entity_type")?,
                    entity_id: row.try_get("entity_id")?,
                    description: row.try_get("description")?,
                    actor_id: row.try_get("actor_id")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
