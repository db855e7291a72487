//! Admin API Endpoints
//!
//! Moderation of users and talks, section management and the audit trail.
//! Every `/admin` handler requires the ADMIN role carried in the access
//! token. The public program, participant and section lists live here too.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::common::{CreatedResponse, SuccessResponse};
use crate::api::middleware::Authenticated;
use crate::domain::{AuditLog, ModerationStatus, PublicParticipant, Section, TalkFilter, TalkOverview};
use crate::error::PlatformError;
use crate::service::{ModerationService, Notifier, SectionDetails, UserSummary};

/// Moderation decision
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusRequest {
    /// WAITING, APPROVED or REJECTED
    pub status: String,
}

/// Section and schedule slot for a talk; omitted fields are cleared
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTalkRequest {
    #[serde(default)]
    pub section_id: Option<Uuid>,
    #[serde(default)]
    pub schedule_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TalksQuery {
    pub section_id: Option<Uuid>,
    #[serde(default)]
    pub only_plenary: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSectionRequest {
    pub title_ru: String,
    #[serde(default)]
    pub title_en: String,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponsiblesRequest {
    pub emails: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub user_id: Uuid,
}

/// The new password, shown once
#[derive(Debug, Serialize, ToSchema)]
pub struct ResetPasswordResponse {
    pub password: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Defaults to 100, capped at 500
    pub limit: Option<i64>,
}

/// Admin service state
#[derive(Clone)]
pub struct AdminState {
    pub moderation: Arc<ModerationService>,
    pub notifier: Notifier,
}

/// List users with roles and profile summary
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    responses(
        (status = 200, description = "Users", body = Vec<UserSummary>),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_users(
    State(state): State<AdminState>,
    auth: Authenticated,
) -> Result<Json<Vec<UserSummary>>, PlatformError> {
    auth.0.require_admin()?;
    Ok(Json(state.moderation.list_users().await?))
}

/// Approve or reject a participant application
#[utoipa::path(
    patch,
    path = "/admin/users/{id}/status",
    tag = "admin",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = SuccessResponse),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "User not found")
    )
)]
pub async fn set_user_status(
    State(state): State<AdminState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    auth.0.require_admin()?;
    let status: ModerationStatus = req.status.parse()?;

    if let Some(event) = state.moderation.set_user_status(&auth.0, id, status).await? {
        state.notifier.dispatch(event).await;
    }
    Ok(Json(SuccessResponse::ok()))
}

/// Replace a user's password with a generated one
#[utoipa::path(
    post,
    path = "/admin/users/reset-password",
    tag = "admin",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "New password", body = ResetPasswordResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn reset_user_password(
    State(state): State<AdminState>,
    auth: Authenticated,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>, PlatformError> {
    auth.0.require_admin()?;
    let password = state.moderation.reset_password(&auth.0, req.user_id).await?;
    Ok(Json(ResetPasswordResponse { password }))
}

/// Make a user the admin of one section
#[utoipa::path(
    post,
    path = "/admin/users/{id}/section-admin/{section_id}",
    tag = "admin",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("section_id" = Uuid, Path, description = "Section ID")
    ),
    responses(
        (status = 200, description = "Role assigned", body = SuccessResponse),
        (status = 404, description = "User or section not found")
    )
)]
pub async fn assign_section_admin(
    State(state): State<AdminState>,
    auth: Authenticated,
    Path((id, section_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    auth.0.require_admin()?;
    state.moderation.assign_section_admin(&auth.0, id, section_id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Remove a section admin assignment
#[utoipa::path(
    delete,
    path = "/admin/users/{id}/section-admin/{section_id}",
    tag = "admin",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("section_id" = Uuid, Path, description = "Section ID")
    ),
    responses(
        (status = 200, description = "Role removed", body = SuccessResponse)
    )
)]
pub async fn remove_section_admin(
    State(state): State<AdminState>,
    auth: Authenticated,
    Path((id, section_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    auth.0.require_admin()?;
    state.moderation.remove_section_admin(&auth.0, id, section_id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// List talks with speaker and section details
#[utoipa::path(
    get,
    path = "/admin/talks",
    tag = "admin",
    params(TalksQuery),
    responses(
        (status = 200, description = "Talks", body = Vec<TalkOverview>)
    )
)]
pub async fn list_talks(
    State(state): State<AdminState>,
    auth: Authenticated,
    Query(query): Query<TalksQuery>,
) -> Result<Json<Vec<TalkOverview>>, PlatformError> {
    auth.0.require_admin()?;
    let filter = TalkFilter {
        section_id: query.section_id,
        only_plenary: query.only_plenary,
        status: None,
    };
    Ok(Json(state.moderation.list_talks(&filter).await?))
}

/// Approve or reject a talk
#[utoipa::path(
    patch,
    path = "/admin/talks/{id}/status",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Talk ID")),
    request_body = SetStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = SuccessResponse),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "Talk not found")
    )
)]
pub async fn set_talk_status(
    State(state): State<AdminState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    auth.0.require_admin()?;
    let status: ModerationStatus = req.status.parse()?;

    if let Some(event) = state.moderation.set_talk_status(&auth.0, id, status).await? {
        state.notifier.dispatch(event).await;
    }
    Ok(Json(SuccessResponse::ok()))
}

/// Assign a talk to a section and schedule slot
#[utoipa::path(
    put,
    path = "/admin/talks/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Talk ID")),
    request_body = ScheduleTalkRequest,
    responses(
        (status = 200, description = "Talk scheduled", body = SuccessResponse),
        (status = 404, description = "Talk or section not found")
    )
)]
pub async fn schedule_talk(
    State(state): State<AdminState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(req): Json<ScheduleTalkRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    auth.0.require_admin()?;
    state
        .moderation
        .schedule_talk(&auth.0, id, req.section_id, req.schedule_time)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// List sections with their responsible addresses
#[utoipa::path(
    get,
    path = "/admin/sections",
    tag = "admin",
    responses(
        (status = 200, description = "Sections", body = Vec<SectionDetails>)
    )
)]
pub async fn list_sections(
    State(state): State<AdminState>,
    auth: Authenticated,
) -> Result<Json<Vec<SectionDetails>>, PlatformError> {
    auth.0.require_admin()?;
    Ok(Json(state.moderation.list_section_details().await?))
}

/// Create a section
#[utoipa::path(
    post,
    path = "/admin/sections",
    tag = "admin",
    request_body = CreateSectionRequest,
    responses(
        (status = 201, description = "Section created", body = CreatedResponse),
        (status = 400, description = "Missing Russian title")
    )
)]
pub async fn create_section(
    State(state): State<AdminState>,
    auth: Authenticated,
    Json(req): Json<CreateSectionRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), PlatformError> {
    auth.0.require_admin()?;
    let section = state
        .moderation
        .create_section(&auth.0, &req.title_ru, &req.title_en, req.sort_order)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse::new(section.id.to_string()))))
}

/// Replace the responsible addresses of a section
#[utoipa::path(
    put,
    path = "/admin/sections/{id}/responsibles",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Section ID")),
    request_body = ResponsiblesRequest,
    responses(
        (status = 200, description = "Normalized address list", body = Vec<String>),
        (status = 400, description = "More than three addresses"),
        (status = 404, description = "Section not found")
    )
)]
pub async fn set_responsibles(
    State(state): State<AdminState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(req): Json<ResponsiblesRequest>,
) -> Result<Json<Vec<String>>, PlatformError> {
    auth.0.require_admin()?;
    Ok(Json(state.moderation.set_responsibles(&auth.0, id, &req.emails).await?))
}

/// Recent audit entries, newest first
#[utoipa::path(
    get,
    path = "/admin/audit",
    tag = "admin",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries", body = Vec<AuditLog>)
    )
)]
pub async fn recent_audit(
    State(state): State<AdminState>,
    auth: Authenticated,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLog>>, PlatformError> {
    auth.0.require_admin()?;
    Ok(Json(state.moderation.recent_audit(query.limit).await?))
}

/// Public section list
#[utoipa::path(
    get,
    path = "/sections",
    tag = "sections",
    responses(
        (status = 200, description = "Sections", body = Vec<Section>)
    )
)]
pub async fn public_sections(State(state): State<AdminState>) -> Result<Json<Vec<Section>>, PlatformError> {
    Ok(Json(state.moderation.list_sections().await?))
}

/// Public conference program: approved talks only
#[utoipa::path(
    get,
    path = "/program",
    tag = "public",
    responses(
        (status = 200, description = "Approved talks", body = Vec<TalkOverview>)
    )
)]
pub async fn public_program(State(state): State<AdminState>) -> Result<Json<Vec<TalkOverview>>, PlatformError> {
    Ok(Json(state.moderation.public_program().await?))
}

/// Public list of approved participants
#[utoipa::path(
    get,
    path = "/participants",
    tag = "public",
    responses(
        (status = 200, description = "Approved participants", body = Vec<PublicParticipant>)
    )
)]
pub async fn public_participants(
    State(state): State<AdminState>,
) -> Result<Json<Vec<PublicParticipant>>, PlatformError> {
    Ok(Json(state.moderation.public_participants().await?))
}

/// Create the admin router (mounted under `/admin`)
pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/reset-password", post(reset_user_password))
        .route("/users/:id/status", patch(set_user_status))
        .route(
            "/users/:id/section-admin/:section_id",
            post(assign_section_admin).delete(remove_section_admin),
        )
        .route("/talks", get(list_talks))
        .route("/talks/:id", put(schedule_talk))
        .route("/talks/:id/status", patch(set_talk_status))
        .route("/sections", get(list_sections).post(create_section))
        .route("/sections/:id/responsibles", put(set_responsibles))
        .route("/audit", get(recent_audit))
        .with_state(state)
}

/// Create the unauthenticated read-only router
pub fn public_router(state: AdminState) -> Router {
    Router::new()
        .route("/sections", get(public_sections))
        .route("/program", get(public_program))
        .route("/participants", get(public_participants))
        .with_state(state)
}
