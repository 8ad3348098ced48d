//! HTTP handlers for the transfer workflow.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    errors::AppError,
    models::{
        UserId,
        art_object::ArtObject,
        transfer::{PendingTransfer, TransferStatus},
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct InitiateTransferReq {
    pub photo_file_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePendingReq {
    pub photo_id: i64,
    pub scanner_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmTransferReq {
    pub transfer_id: Uuid,
    pub accept: bool,
}

/// POST `/transfers/initiate`: instant scan-to-copy, caller is the scanner.
pub async fn initiate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<InitiateTransferReq>,
) -> Result<(StatusCode, Json<ArtObject>), AppError> {
    let copy = state.transfers.initiate(user, &req.photo_file_id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// POST `/transfers/pending`: confirm-first offer, caller is the sharer.
pub async fn create_pending(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreatePendingReq>,
) -> Result<(StatusCode, Json<PendingTransfer>), AppError> {
    let transfer = state
        .transfers
        .create_pending(user, req.scanner_id, req.photo_id)
        .await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

/// POST `/transfers/confirm`: sharer decides a pending transfer.
pub async fn confirm(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ConfirmTransferReq>,
) -> Result<Json<Value>, AppError> {
    let status = state
        .transfers
        .confirm(user, req.transfer_id, req.accept)
        .await?;
    let message = match status {
        TransferStatus::Accepted => "Transfer accepted and photo ownership updated.",
        _ => "Transfer rejected.",
    };
    Ok(Json(json!({ "message": message })))
}
