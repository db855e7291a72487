use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::parse_status;
use crate::domain::{Profile, Talk, TalkAuthor, TalkFilter, TalkKind, TalkOverview, TalkStatus};
use crate::error::{PlatformError, Result};
use crate::repository::TalkRepository;

const TALK_COLUMNS: &str = "id, speaker_id, section_id, title, affiliation, abstract, kind, authors, file_url, status, schedule_time, created_at";

pub struct PgTalkRepository {
    pool: PgPool,
}

impl PgTalkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn talk_from_row(row: &PgRow) -> Result<Talk> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let authors: Json<Vec<TalkAuthor>> = row.try_get("authors")?;
    Ok(Talk {
        id: row.try_get("id")?,
        speaker_id: row.try_get("speaker_id")?,
        section_id: row.try_get("section_id")?,
        title: row.try_get("title")?,
        affiliation: row.try_get("affiliation")?,
        abstract_text: row.try_get("abstract")?,
        kind: kind.parse::<TalkKind>()?,
        authors: authors.0,
        file_url: row.try_get("file_url")?,
        status: parse_status(&status)?,
        schedule_time: row.try_get("schedule_time")?,
        created_at: row.try_get("created_at")?,
    })
}

fn not_found_unless_touched(rows: u64, id: Uuid) -> Result<()> {
    if rows == 0 {
        return Err(PlatformError::not_found("Talk", id.to_string()));
    }
    Ok(())
}

#[async_trait]
impl TalkRepository for PgTalkRepository {
    async fn create_within_quota(&self, talk: &Talk, limit: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Serialise concurrent creates from the same speaker on the user row.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(talk.speaker_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| PlatformError::not_found("User", talk.speaker_id.to_string()))?;

        let owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM talks WHERE speaker_id = $1")
            .bind(talk.speaker_id)
            .fetch_one(&mut *tx)
            .await?;
        if owned >= limit {
            return Err(PlatformError::TalkLimitReached { limit });
        }

        sqlx::query(&format!(
            "INSERT INTO talks ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            TALK_COLUMNS
        ))
        .bind(talk.id)
        .bind(talk.speaker_id)
        .bind(talk.section_id)
        .bind(&talk.title)
        .bind(&talk.affiliation)
        .bind(&talk.abstract_text)
        .bind(talk.kind.as_str())
        .bind(Json(&talk.authors))
        .bind(&talk.file_url)
        .bind(talk.status.as_str())
        .bind(talk.schedule_time)
        .bind(talk.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Talk>> {
        let row = sqlx::query(&format!("SELECT {} FROM talks WHERE id = $1", TALK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(talk_from_row).transpose()
    }

    async fn update(&self, talk: &Talk) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE talks
            SET section_id = $2, title = $3, affiliation = $4, abstract = $5,
                kind = $6, authors = $7, status = $8
            WHERE id = $1
            "#,
        )
        .bind(talk.id)
        .bind(talk.section_id)
        .bind(&talk.title)
        .bind(&talk.affiliation)
        .bind(&talk.abstract_text)
        .bind(talk.kind.as_str())
        .bind(Json(&talk.authors))
        .bind(talk.status.as_str())
        .execute(&self.pool)
        .await?;
        not_found_unless_touched(result.rows_affected(), talk.id)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM talks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_speaker(&self, speaker_id: Uuid) -> Result<Vec<Talk>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM talks WHERE speaker_id = $1 ORDER BY created_at DESC",
            TALK_COLUMNS
        ))
        .bind(speaker_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(talk_from_row).collect()
    }

    async fn count_by_speaker(&self, speaker_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM talks WHERE speaker_id = $1")
            .bind(speaker_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn set_status(&self, id: Uuid, status: TalkStatus) -> Result<Option<TalkStatus>> {
        let row = sqlx::query(
            r#"
            UPDATE talks t
            SET status = $2
            FROM (SELECT id, status FROM talks WHERE id = $1 FOR UPDATE) prev
            WHERE t.id = prev.id
            RETURNING prev.status AS previous
            "#,
        )
        .bind(id)
        .bind(status.as_str())
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

    async fn set_file_url(&self, id: Uuid, file_url: Option<&str>) -> Result<()> {
        let result = sqlx::query("UPDATE talks SET file_url = $2 WHERE id = $1")
            .bind(id)
            .bind(file_url)
            .execute(&self.pool)
            .await?;
        not_found_unless_touched(result.rows_affected(), id)
    }

    async fn set_schedule(
        &self,
        id: Uuid,
        section_id: Option<Uuid>,
        schedule_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE talks SET section_id = $2, schedule_time = $3 WHERE id = $1")
            .bind(id)
            .bind(section_id)
            .bind(schedule_time)
            .execute(&self.pool)
            .await?;
        not_found_unless_touched(result.rows_affected(), id)
    }

    async fn list_overview(&self, filter: &TalkFilter) -> Result<Vec<TalkOverview>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.title, t.kind, t.status, t.abstract, t.authors, t.section_id,
                   t.schedule_time, t.file_url,
                   s.title_ru AS section_title_ru, s.title_en AS section_title_en,
                   COALESCE(p.surname, '') AS surname,
                   COALESCE(p.name, '') AS name,
                   COALESCE(p.patronymic, '') AS patronymic,
                   COALESCE(p.city, '') AS city,
                   COALESCE(p.affiliation, '') AS speaker_affiliation
            FROM talks t
            LEFT JOIN sections s ON s.id = t.section_id
            LEFT JOIN profiles p ON p.user_id = t.speaker_id
            WHERE ($1::uuid IS NULL OR t.section_id = $1)
              AND (NOT $2 OR t.kind = 'PLENARY')
              AND ($3::text IS NULL OR t.status = $3)
            ORDER BY t.created_at
            "#,
        )
        .bind(filter.section_id)
        .bind(filter.only_plenary)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.try_get("kind")?;
            let status: String = row.try_get("status")?;
            let authors: Json<Vec<TalkAuthor>> = row.try_get("authors")?;
            let speaker = Profile {
                surname: row.try_get("surname")?,
                name: row.try_get("name")?,
                patronymic: row.try_get("patronymic")?,
                ..Default::default()
            };
            out.push(TalkOverview {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                kind: kind.parse()?,
                status: parse_status(&status)?,
                abstract_text: row.try_get("abstract")?,
                authors: authors.0,
                section_id: row.try_get("section_id")?,
                section_title_ru: row.try_get("section_title_ru")?,
                section_title_en: row.try_get("section_title_en")?,
                schedule_time: row.try_get("schedule_time")?,
                file_url: row.try_get("file_url")?,
                speaker_full_name: speaker.full_name(),
                speaker_city: row.try_get("city")?,
                speaker_affiliation: row.try_get("speaker_affiliation")?,
            });
        }
        Ok(out)
    }
}
