//! HTTP handlers for the profile permission workflow.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    errors::AppError,
    models::{
        UserId,
        art_object::ArtObject,
        profile_request::PendingRequest,
    },
    services::profile_service::{RequestCreated, RequestState},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateRequestReq {
    pub target_user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct RespondReq {
    pub approved: bool,
    #[serde(default)]
    pub photo_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePhotosReq {
    pub photo_ids: Vec<i64>,
}

/// POST `/profile-requests/create`
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateRequestReq>,
) -> Result<Json<RequestCreated>, AppError> {
    Ok(Json(state.profiles.create(user, req.target_user_id).await?))
}

/// GET `/profile-requests/pending`: incoming pending requests.
pub async fn pending(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PendingRequest>>, AppError> {
    Ok(Json(state.profiles.pending_for_target(user).await?))
}

/// POST `/profile-requests/{request_id}/respond`
pub async fn respond(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<Uuid>,
    Json(req): Json<RespondReq>,
) -> Result<Json<Value>, AppError> {
    let photo_count = state
        .profiles
        .respond(user, request_id, req.approved, &req.photo_ids)
        .await?;
    let verdict = if req.approved { "approved" } else { "rejected" };
    Ok(Json(json!({
        "message": format!("Request {verdict}"),
        "photo_count": photo_count
    })))
}

/// PUT `/profile-requests/{request_id}/update-photos`
pub async fn update_photos(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<Uuid>,
    Json(req): Json<UpdatePhotosReq>,
) -> Result<Json<Value>, AppError> {
    let photo_count = state
        .profiles
        .update_selection(user, request_id, &req.photo_ids)
        .await?;
    Ok(Json(json!({
        "message": "Permission photos updated successfully.",
        "photo_count": photo_count
    })))
}

/// DELETE `/profile-requests/{request_id}/revoke`
pub async fn revoke(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.profiles.revoke(user, request_id).await?;
    Ok(Json(json!({ "message": "Permission revoked successfully." })))
}

/// GET `/profile-requests/user/{user_id}/request-status`: latest request
/// from the caller toward the given user.
pub async fn request_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(target_id): Path<UserId>,
) -> Result<Json<RequestState>, AppError> {
    Ok(Json(state.profiles.request_status(user, target_id).await?))
}

/// GET `/profile-requests/user/{user_id}/effective-access`: objects of the
/// given user the caller may currently view.
pub async fn effective_access(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(target_id): Path<UserId>,
) -> Result<Json<Vec<ArtObject>>, AppError> {
    Ok(Json(state.profiles.effective_access(user, target_id).await?))
}
