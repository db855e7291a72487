//! PostgreSQL Repositories

mod audit;
mod profiles;
mod sections;
mod sessions;
mod talks;
mod users;

pub use audit::PgAuditLogRepository;
pub use profiles::PgProfileRepository;
pub use sections::PgSectionRepository;
pub use sessions::{PgEmailTokenRepository, PgSessionRepository};
pub use talks::PgTalkRepository;
pub use users::PgUserRepository;

use sqlx::PgPool;
use tracing::info;

use crate::domain::ModerationStatus;
use crate::error::{PlatformError, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sections (
    id UUID PRIMARY KEY,
    title_ru TEXT NOT NULL,
    title_en TEXT NOT NULL DEFAULT '',
    sort_order INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS section_responsibles (
    section_id UUID NOT NULL REFERENCES sections(id) ON DELETE CASCADE,
    email TEXT NOT NULL,
    PRIMARY KEY (section_id, email)
);

CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    email_verified BOOLEAN NOT NULL DEFAULT FALSE,
    status TEXT NOT NULL DEFAULT 'WAITING',
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    section_id UUID REFERENCES sections(id) ON DELETE CASCADE,
    position BIGSERIAL
);
CREATE UNIQUE INDEX IF NOT EXISTS ux_user_roles_scope ON user_roles (
    user_id, role, COALESCE(section_id, '00000000-0000-0000-0000-000000000000'::uuid)
);

CREATE TABLE IF NOT EXISTS profiles (
    user_id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    surname TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL DEFAULT '',
    patronymic TEXT NOT NULL DEFAULT '',
    city TEXT NOT NULL DEFAULT '',
    affiliation TEXT NOT NULL DEFAULT '',
    position TEXT NOT NULL DEFAULT '',
    phone TEXT NOT NULL DEFAULT '',
    academic_degree TEXT,
    birth_date DATE,
    postal_address TEXT NOT NULL DEFAULT '',
    consent_data_processing BOOLEAN NOT NULL DEFAULT FALSE,
    consent_data_transfer BOOLEAN NOT NULL DEFAULT FALSE
);
ALTER TABLE profiles ADD COLUMN IF NOT EXISTS birth_date DATE;
ALTER TABLE profiles ADD COLUMN IF NOT EXISTS postal_address TEXT NOT NULL DEFAULT '';
ALTER TABLE profiles ADD COLUMN IF NOT EXISTS consent_data_processing BOOLEAN NOT NULL DEFAULT FALSE;
ALTER TABLE profiles ADD COLUMN IF NOT EXISTS consent_data_transfer BOOLEAN NOT NULL DEFAULT FALSE;
CREATE INDEX IF NOT EXISTS idx_profiles_name ON profiles(surname, name);

CREATE TABLE IF NOT EXISTS refresh_sessions (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_hash TEXT NOT NULL UNIQUE,
    expires_at TIMESTAMPTZ NOT NULL,
    revoked_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_refresh_sessions_user ON refresh_sessions(user_id);

CREATE TABLE IF NOT EXISTS email_verify_tokens (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_hash TEXT NOT NULL UNIQUE,
    expires_at TIMESTAMPTZ NOT NULL,
    used_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS talks (
    id UUID PRIMARY KEY,
    speaker_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    section_id UUID REFERENCES sections(id) ON DELETE SET NULL,
    title TEXT NOT NULL,
    affiliation TEXT NOT NULL,
    abstract TEXT NOT NULL,
    kind TEXT NOT NULL,
    authors JSONB NOT NULL,
    file_url TEXT,
    status TEXT NOT NULL DEFAULT 'WAITING',
    schedule_time TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_talks_speaker ON talks(speaker_id);
CREATE INDEX IF NOT EXISTS idx_talks_section ON talks(section_id);

CREATE TABLE IF NOT EXISTS audit_logs (
    id UUID PRIMARY KEY,
    action TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT,
    description TEXT NOT NULL,
    actor_id UUID,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_logs_created ON audit_logs(created_at DESC);
"#;

/// Create every table and index that does not exist yet.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    info!("Database schema ready");
    Ok(())
}

fn parse_status(raw: &str) -> Result<ModerationStatus> {
    raw.parse()
        .map_err(|_| PlatformError::internal(format!("Unknown status stored: {}", raw)))
}
