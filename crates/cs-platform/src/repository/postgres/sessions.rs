use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{EmailVerifyToken, RefreshSession};
use crate::error::{PlatformError, Result};
use crate::repository::{EmailTokenRepository, SessionRepository};

pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn session_from_row(row: &PgRow) -> Result<RefreshSession> {
    Ok(RefreshSession {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token_hash: row.try_get("token_hash")?,
        expires_at: row.try_get("expires_at")?,
        revoked_at: row.try_get("revoked_at")?,
        created_at: row.try_get("created_at")?,
    })
}

const INSERT_SESSION: &str = "INSERT INTO refresh_sessions (id, user_id, token_hash, expires_at, revoked_at, created_at) VALUES ($1, $2, $3, $4, $5, $6)";

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(&self, session: &RefreshSession) -> Result<()> {
        sqlx::query(INSERT_SESSION)
            .bind(session.id)
            .bind(session.user_id)
            .bind(&session.token_hash)
            .bind(session.expires_at)
            .bind(session.revoked_at)
            .bind(session.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshSession>> {
        let row = sqlx::query(
            "SELECT id, user_id, token_hash, expires_at, revoked_at, created_at FROM refresh_sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn revoke_by_hash(&self, token_hash: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE refresh_sessions SET revoked_at = $2 WHERE token_hash = $1 AND revoked_at IS NULL")
            .bind(token_hash)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rotate(&self, old_id: Uuid, next: &RefreshSession, now: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let revoked = sqlx::query("UPDATE refresh_sessions SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL")
            .bind(old_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        if revoked.rows_affected() == 0 {
            // dropping tx rolls back
            return Err(PlatformError::unauthorized("refresh session already used"));
        }

        sqlx::query(INSERT_SESSION)
            .bind(next.id)
            .bind(next.user_id)
            .bind(&next.token_hash)
            .bind(next.expires_at)
            .bind(next.revoked_at)
            .bind(next.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

pub struct PgEmailTokenRepository {
    pool: PgPool,
}

impl PgEmailTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailTokenRepository for PgEmailTokenRepository {
    async fn create(&self, token: &EmailVerifyToken) -> Result<()> {
        sqlx::query(
            "INSERT INTO email_verify_tokens (id, user_id, token_hash, expires_at, used_at, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.used_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<EmailVerifyToken>> {
        let row = sqlx::query(
            "SELECT id, user_id, token_hash, expires_at, used_at, created_at FROM email_verify_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(EmailVerifyToken {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                token_hash: row.try_get("token_hash")?,
                expires_at: row.try_get("expires_at")?,
                used_at: row.try_get("used_at")?,
                created_at: row.try_get("created_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE email_verify_tokens SET used_at = $2 WHERE id = $1 AND used_at IS NULL")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
