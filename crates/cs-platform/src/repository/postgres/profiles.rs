use async_trait::async_trait;
use sqlx::postgres::{PgExecutor, PgRow};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{Profile, PublicParticipant};
use crate::error::Result;
use crate::repository::ProfileRepository;

const PROFILE_COLUMNS: &str = "user_id, surname, name, patronymic, city, affiliation, position, phone, \
     academic_degree, birth_date, postal_address, consent_data_processing, consent_data_transfer";

pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn profile_from_row(row: &PgRow) -> Result<Profile> {
    Ok(Profile {
        user_id: row.try_get("user_id")?,
        surname: row.try_get("surname")?,
        name: row.try_get("name")?,
        patronymic: row.try_get("patronymic")?,
        city: row.try_get("city")?,
        affiliation: row.try_get("affiliation")?,
        position: row.try_get("position")?,
        phone: row.try_get("phone")?,
        academic_degree: row.try_get("academic_degree")?,
        birth_date: row.try_get("birth_date")?,
        postal_address: row.try_get("postal_address")?,
        consent_data_processing: row.try_get("consent_data_processing")?,
        consent_data_transfer: row.try_get("consent_data_transfer")?,
    })
}

/// Insert or replace a profile on any executor, so user creation can run it
/// inside its own transaction.
pub(super) async fn upsert_profile<'e, E>(executor: E, profile: &Profile) -> Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(&format!(
        r#"
        INSERT INTO profiles ({})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (user_id) DO UPDATE SET
            surname = EXCLUDED.surname,
            name = EXCLUDED.name,
            patronymic = EXCLUDED.patronymic,
            city = EXCLUDED.city,
            affiliation = EXCLUDED.affiliation,
            position = EXCLUDED.position,
            phone = EXCLUDED.phone,
            academic_degree = EXCLUDED.academic_degree,
            birth_date = EXCLUDED.birth_date,
            postal_address = EXCLUDED.postal_address,
            consent_data_processing = EXCLUDED.consent_data_processing,
            consent_data_transfer = EXCLUDED.consent_data_transfer
        "#,
        PROFILE_COLUMNS
    ))
    .bind(profile.user_id)
    .bind(&profile.surname)
    .bind(&profile.name)
    .bind(&profile.patronymic)
    .bind(&profile.city)
    .bind(&profile.affiliation)
    .bind(&profile.position)
    .bind(&profile.phone)
    .bind(&profile.academic_degree)
    .bind(profile.birth_date)
    .bind(&profile.postal_address)
    .bind(profile.consent_data_processing)
    .bind(profile.consent_data_transfer)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn get(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let row = sqlx::query(&format!("SELECT {} FROM profiles WHERE user_id = $1", PROFILE_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn upsert(&self, profile: &Profile) -> Result<()> {
        upsert_profile(&self.pool, profile).await
    }

    async fn get_many(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, Profile>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(&format!("SELECT {} FROM profiles WHERE user_id = ANY($1)", PROFILE_COLUMNS))
            .bind(user_ids)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| profile_from_row(row).map(|p| (p.user_id, p)))
            .collect()
    }

    async fn list_approved_public(&self) -> Result<Vec<PublicParticipant>> {
        let rows = sqlx::query(
            r#"
            SELECT p.surname, p.name, p.patronymic, p.city, p.affiliation
            FROM profiles p
            JOIN users u ON u.id = p.user_id
            WHERE u.status = 'APPROVED'
            ORDER BY p.surname, p.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let profile = Profile {
                    surname: row.try_get("surname")?,
                    name: row.try_get("name")?,
                    patronymic: row.try_get("patronymic")?,
                    city: row.try_get("city")?,
                    affiliation: row.try_get("affiliation")?,
                    ..Default::default()
                };
                Ok(PublicParticipant::from(&profile))
            })
            .collect()
    }
}
