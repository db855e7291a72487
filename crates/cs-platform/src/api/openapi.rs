//! OpenAPI Documentation
//!
//! Central OpenAPI specification for all platform APIs.

use utoipa::OpenApi;

/// Platform API OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ConfSite Platform API",
        version = "1.0.0",
        description = "Registration, sessions, talk submission and moderation"
    ),
    servers(
        (url = "http://localhost:8084", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Registration and sessions"),
        (name = "participant", description = "Current user and profile"),
        (name = "talks", description = "Talk submission"),
        (name = "sections", description = "Conference sections"),
        (name = "public", description = "Published program and participants"),
        (name = "admin", description = "Moderation and administration")
    ),
    paths(
        // Auth API
        super::auth::register,
        super::auth::login,
        super::auth::refresh,
        super::auth::logout,
        super::auth::verify_email,
        // Participant API
        super::participant::get_me,
        super::participant::get_profile,
        super::participant::put_profile,
        super::participant::submit_registration,
        super::participant::create_talk,
        super::participant::list_talks,
        super::participant::get_talk,
        super::participant::update_talk,
        super::participant::delete_talk,
        super::participant::set_talk_file,
        // Admin API
        super::admin::list_users,
        super::admin::reset_user_password,
        super::admin::set_user_status,
        super::admin::assign_section_admin,
        super::admin::remove_section_admin,
        super::admin::list_talks,
        super::admin::set_talk_status,
        super::admin::schedule_talk,
        super::admin::list_sections,
        super::admin::create_section,
        super::admin::set_responsibles,
        super::admin::recent_audit,
        super::admin::public_sections,
        super::admin::public_program,
        super::admin::public_participants,
    ),
    components(
        schemas(
            // Common schemas
            super::common::ApiError,
            super::common::SuccessResponse,
            super::common::CreatedResponse,
            // Domain schemas
            crate::domain::ModerationStatus,
            crate::domain::Role,
            crate::domain::RoleAssignment,
            crate::domain::TalkKind,
            crate::domain::TalkAuthor,
        )
    )
)]
pub struct PlatformApiDoc;
