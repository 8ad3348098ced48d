//! HTTP handlers for art-object metadata and imported references.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{
    auth::CurrentUser,
    errors::AppError,
    models::art_object::{ArtObject, ArtObjectPatch},
    state::AppState,
};

/// PATCH `/art-objects/{photo_id}`: typed partial metadata update.
pub async fn update_metadata(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(photo_id): Path<i64>,
    Json(patch): Json<ArtObjectPatch>,
) -> Result<Json<ArtObject>, AppError> {
    Ok(Json(state.catalog.update_metadata(user, photo_id, patch).await?))
}

/// POST `/art-objects/{photo_id}/import`
pub async fn import_photo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(photo_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state.catalog.import_photo(user, photo_id).await?;
    Ok(Json(json!({
        "message": "Photo imported successfully",
        "photo_id": photo_id
    })))
}

/// DELETE `/art-objects/{photo_id}/import`
pub async fn remove_imported(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(photo_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.catalog.remove_imported(user, photo_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
