//! Participant API Endpoints
//!
//! Endpoints for the signed-in user: current identity, own profile, the
//! registration form and own talk submissions.

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::common::{CreatedResponse, LangQuery, SuccessResponse};
use crate::api::middleware::{Authenticated, RateLimit};
use crate::domain::{Profile, RegistrationForm, Role, Talk, TalkDraft, UserStatus};
use crate::error::PlatformError;
use crate::repository::ProfileRepository;
use crate::service::{AuthService, Notifier, RegistrationService, TalkService};

/// Current user info response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    pub status: UserStatus,
    /// Resolved from stored state, not from the access token
    pub roles: Vec<Role>,
}

/// Record an uploaded thesis
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TalkFileRequest {
    /// Public URL of the stored file; omit when the file went nowhere public
    #[serde(default)]
    pub file_url: Option<String>,
}

/// Participant service state
#[derive(Clone)]
pub struct ParticipantState {
    pub auth: Arc<AuthService>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub talks: Arc<TalkService>,
    pub registration: Arc<RegistrationService>,
    pub notifier: Notifier,
    pub register_limit: RateLimit,
}

/// Get current user info
#[utoipa::path(
    get,
    path = "/me",
    tag = "participant",
    responses(
        (status = 200, description = "Current user info", body = MeResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(
    State(state): State<ParticipantState>,
    auth: Authenticated,
) -> Result<Json<MeResponse>, PlatformError> {
    let (user, roles) = state
        .auth
        .current_user(auth.0.user_id)
        .await
        .map_err(|e| match e {
            PlatformError::NotFound { .. } => PlatformError::unauthorized("user no longer exists"),
            other => other,
        })?;

    Ok(Json(MeResponse {
        id: user.id,
        email: user.email,
        status: user.status,
        roles,
    }))
}

/// Get own profile
#[utoipa::path(
    get,
    path = "/participant/profile",
    tag = "participant",
    responses(
        (status = 200, description = "Profile", body = Profile),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_profile(
    State(state): State<ParticipantState>,
    auth: Authenticated,
) -> Result<Json<Profile>, PlatformError> {
    let user_id = auth.0.user_id;
    let profile = state
        .profiles
        .get(user_id)
        .await?
        .unwrap_or_else(|| Profile::empty(user_id));
    Ok(Json(profile))
}

/// Replace own profile
#[utoipa::path(
    put,
    path = "/participant/profile",
    tag = "participant",
    request_body = Profile,
    responses(
        (status = 200, description = "Profile saved", body = Profile),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn put_profile(
    State(state): State<ParticipantState>,
    auth: Authenticated,
    Json(mut profile): Json<Profile>,
) -> Result<Json<Profile>, PlatformError> {
    profile.user_id = auth.0.user_id;
    state.profiles.upsert(&profile).await?;
    Ok(Json(profile))
}

/// Submit the registration form
///
/// Allowed only while the account is WAITING. Mails a receipt to the user
/// and a notice to each organizer.
#[utoipa::path(
    post,
    path = "/registration/submit",
    tag = "participant",
    params(LangQuery),
    request_body = RegistrationForm,
    responses(
        (status = 200, description = "Form accepted", body = SuccessResponse),
        (status = 400, description = "Invalid form, missing consent or already processed"),
        (status = 401, description = "Not authenticated"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn submit_registration(
    State(state): State<ParticipantState>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
    auth: Authenticated,
    Query(query): Query<LangQuery>,
    Json(form): Json<RegistrationForm>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    state.register_limit.check_request(&headers, connect.as_ref())?;

    let event = state
        .registration
        .submit(auth.0.user_id, form, query.lang())
        .await?;
    state.notifier.dispatch(event).await;
    Ok(Json(SuccessResponse::ok()))
}

/// Submit a talk
#[utoipa::path(
    post,
    path = "/participant/talks",
    tag = "talks",
    request_body = TalkDraft,
    responses(
        (status = 201, description = "Talk submitted", body = CreatedResponse),
        (status = 400, description = "Invalid talk"),
        (status = 422, description = "Talk limit reached")
    )
)]
pub async fn create_talk(
    State(state): State<ParticipantState>,
    auth: Authenticated,
    Json(draft): Json<TalkDraft>,
) -> Result<(StatusCode, Json<CreatedResponse>), PlatformError> {
    let talk = state.talks.create(auth.0.user_id, &draft).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse::new(talk.id.to_string()))))
}

/// List own talks
#[utoipa::path(
    get,
    path = "/participant/talks",
    tag = "talks",
    responses(
        (status = 200, description = "Own talks", body = Vec<Talk>)
    )
)]
pub async fn list_talks(
    State(state): State<ParticipantState>,
    auth: Authenticated,
) -> Result<Json<Vec<Talk>>, PlatformError> {
    Ok(Json(state.talks.list_mine(auth.0.user_id).await?))
}

/// Get one own talk
#[utoipa::path(
    get,
    path = "/participant/talks/{id}",
    tag = "talks",
    params(("id" = Uuid, Path, description = "Talk ID")),
    responses(
        (status = 200, description = "Talk", body = Talk),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Talk not found")
    )
)]
pub async fn get_talk(
    State(state): State<ParticipantState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<Talk>, PlatformError> {
    Ok(Json(state.talks.get_mine(auth.0.user_id, id).await?))
}

/// Update own talk; it goes back to moderation
#[utoipa::path(
    put,
    path = "/participant/talks/{id}",
    tag = "talks",
    params(("id" = Uuid, Path, description = "Talk ID")),
    request_body = TalkDraft,
    responses(
        (status = 200, description = "Talk updated", body = SuccessResponse),
        (status = 400, description = "Invalid talk"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Talk not found")
    )
)]
pub async fn update_talk(
    State(state): State<ParticipantState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
    Json(draft): Json<TalkDraft>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    state.talks.update(auth.0.user_id, id, &draft).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Delete own talk
#[utoipa::path(
    delete,
    path = "/participant/talks/{id}",
    tag = "talks",
    params(("id" = Uuid, Path, description = "Talk ID")),
    responses(
        (status = 200, description = "Talk deleted", body = SuccessResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Talk not found")
    )
)]
pub async fn delete_talk(
    State(state): State<ParticipantState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    state.talks.delete(auth.0.user_id, id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Record the uploaded thesis file for a talk
///
/// Notifies the speaker and the section responsibles (or the organizers).
#[utoipa::path(
    post,
    path = "/participant/talks/{id}/file",
    tag = "talks",
    params(("id" = Uuid, Path, description = "Talk ID"), LangQuery),
    request_body = TalkFileRequest,
    responses(
        (status = 200, description = "Upload recorded", body = SuccessResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Talk not found")
    )
)]
pub async fn set_talk_file(
    State(state): State<ParticipantState>,
    auth: Authenticated,
    Path(id): Path<Uuid>,
    Query(query): Query<LangQuery>,
    Json(req): Json<TalkFileRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    let event = state
        .talks
        .set_file_url(auth.0.user_id, id, req.file_url.as_deref(), query.lang())
        .await?;
    state.notifier.dispatch(event).await;
    Ok(Json(SuccessResponse::ok()))
}

/// Create the participant router
pub fn participant_router(state: ParticipantState) -> Router {
    Router::new()
        .route("/me", get(get_me))
        .route("/participant/profile", get(get_profile).put(put_profile))
        .route("/registration/submit", post(submit_registration))
        .route("/participant/talks", get(list_talks).post(create_talk))
        .route(
            "/participant/talks/:id",
            get(get_talk).put(update_talk).delete(delete_talk),
        )
        .route("/participant/talks/:id/file", post(set_talk_file))
        .with_state(state)
}
