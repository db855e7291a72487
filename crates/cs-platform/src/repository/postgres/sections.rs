use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::Section;
use crate::error::{PlatformError, Result};
use crate::repository::SectionRepository;

pub struct PgSectionRepository {
    pool: PgPool,
}

impl PgSectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn section_from_row(row: &PgRow) -> Result<Section> {
    Ok(Section {
        id: row.try_get("id")?,
        title_ru: row.try_get("title_ru")?,
        title_en: row.try_get("title_en")?,
        sort_order: row.try_get("sort_order")?,
    })
}

#[async_trait]
impl SectionRepository for PgSectionRepository {
    async fn list(&self) -> Result<Vec<Section>> {
        let rows = sqlx::query("SELECT id, title_ru, title_en, sort_order FROM sections ORDER BY sort_order, title_ru")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(section_from_row).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Section>> {
        let row = sqlx::query("SELECT id, title_ru, title_en, sort_order FROM sections WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(section_from_row).transpose()
    }

    async fn create(&self, section: &Section) -> Result<()> {
        sqlx::query("INSERT INTO sections (id, title_ru, title_en, sort_order) VALUES ($1, $2, $3, $4)")
            .bind(section.id)
            .bind(&section.title_ru)
            .bind(&section.title_en)
            .bind(section.sort_order)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn responsible_emails(&self, section_id: Uuid) -> Result<Vec<String>> {
        let emails: Vec<String> =
            sqlx::query_scalar("SELECT email FROM section_responsibles WHERE section_id = $1 ORDER BY email")
                .bind(section_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(emails)
    }

    async fn replace_responsibles(&self, section_id: Uuid, emails: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM sections WHERE id = $1 FOR UPDATE")
            .bind(section_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| PlatformError::not_found("Section", section_id.to_string()))?;

        sqlx::query("DELETE FROM section_responsibles WHERE section_id = $1")
            .bind(section_id)
            .execute(&mut *tx)
            .await?;

        for email in emails {
            sqlx::query("INSERT INTO section_responsibles (section_id, email) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(section_id)
                .bind(email)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
