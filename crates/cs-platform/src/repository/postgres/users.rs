use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

use super::parse_status;
use super::profiles::upsert_profile;
use crate::domain::{Profile, Role, RoleAssignment, User, UserStatus, UserWithRoles};
use crate::error::{PlatformError, Result};
use crate::repository::UserRepository;

const USER_COLUMNS: &str = "id, email, password_hash, email_verified, status, created_at, updated_at";

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn roles_of(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>> {
        let rows = sqlx::query("SELECT role, section_id FROM user_roles WHERE user_id = $1 ORDER BY position")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(role_from_row).collect()
    }

    async fn attach_roles(&self, row: Option<PgRow>) -> Result<Option<UserWithRoles>> {
        match row {
            Some(row) => {
                let user = user_from_row(&row)?;
                let roles = self.roles_of(user.id).await?;
                Ok(Some(UserWithRoles { user, roles }))
            }
            None => Ok(None),
        }
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let status: String = row.try_get("status")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        email_verified: row.try_get("email_verified")?,
        status: parse_status(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn role_from_row(row: &PgRow) -> Result<RoleAssignment> {
    let role: String = row.try_get("role")?;
    Ok(RoleAssignment {
        role: role.parse::<Role>()?,
        section_id: row.try_get("section_id")?,
    })
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User, roles: &[RoleAssignment], profile: &Profile) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO users ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.email_verified)
        .bind(user.status.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| PlatformError::from_insert(e, "User", "email", &user.email))?;

        for assignment in roles {
            sqlx::query("INSERT INTO user_roles (user_id, role, section_id) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
                .bind(user.id)
                .bind(assignment.role.as_str())
                .bind(assignment.section_id)
                .execute(&mut *tx)
                .await?;
        }

        upsert_profile(&mut *tx, &Profile { user_id: user.id, ..profile.clone() }).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserWithRoles>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        self.attach_roles(row).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserWithRoles>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        self.attach_roles(row).await
    }

    async fn list(&self) -> Result<Vec<UserWithRoles>> {
        let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        let role_rows = sqlx::query("SELECT user_id, role, section_id FROM user_roles ORDER BY position")
            .fetch_all(&self.pool)
            .await?;

        let mut roles: HashMap<Uuid, Vec<RoleAssignment>> = HashMap::new();
        for row in &role_rows {
            let user_id: Uuid = row.try_get("user_id")?;
            roles.entry(user_id).or_default().push(role_from_row(row)?);
        }

        rows.iter()
            .map(|row| {
                let user = user_from_row(row)?;
                let roles = roles.remove(&user.id).unwrap_or_default();
                Ok(UserWithRoles { user, roles })
            })
            .collect()
    }

    async fn set_status(&self, id: Uuid, status: UserStatus, now: DateTime<Utc>) -> Result<Option<UserStatus>> {
        let row = sqlx::query(
            r#"
            UPDATE users u
            SET status = $2, updated_at = $3
            FROM (SELECT id, status FROM users WHERE id = $1 FOR UPDATE) prev
            WHERE u.id = prev.id
            RETURNING prev.status AS previous
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let previous: String = row.try_get("previous")?;
                Ok(Some(parse_status(&previous)?))
            }
            None => Ok(None),
        }
    }

    async fn mark_email_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE users SET email_verified = TRUE, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PlatformError::not_found("User", id.to_string()));
        }
        Ok(())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str, now: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .bind(now)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PlatformError::not_found("User", id.to_string()));
        }
        Ok(())
    }

    async fn assign_role(&self, id: Uuid, assignment: &RoleAssignment) -> Result<()> {
        sqlx::query("INSERT INTO user_roles (user_id, role, section_id) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
            .bind(id)
            .bind(assignment.role.as_str())
            .bind(assignment.section_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_role(&self, id: Uuid, assignment: &RoleAssignment) -> Result<()> {
        sqlx::query(
            "DELETE FROM user_roles WHERE user_id = $1 AND role = $2 AND section_id IS NOT DISTINCT FROM $3",
        )
        .bind(id)
        .bind(assignment.role.as_str())
        .bind(assignment.section_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
