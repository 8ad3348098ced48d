//! HTTP handlers for the trade workflow.

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
    models::trade::{ScannedTrade, Trade},
    services::trade_service::{ShareCreated, ShareScanned, TradeInitiated},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateShareReq {
    pub art_object_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct InitiateReq {
    pub art_object_id: i64,
}

/// POST `/trades/create-share`: batch of trades behind one QR share token.
pub async fn create_share(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateShareReq>,
) -> Result<Json<ShareCreated>, AppError> {
    let created = state.trades.create_share(user, &req.art_object_ids).await?;
    Ok(Json(created))
}

/// POST `/trades/initiate`: legacy single-object trade.
pub async fn initiate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<InitiateReq>,
) -> Result<Json<TradeInitiated>, AppError> {
    let initiated = state.trades.initiate_single(user, req.art_object_id).await?;
    Ok(Json(initiated))
}

/// GET `/trades/scanned`: the caller's trades awaiting their confirmation.
pub async fn scanned(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ScannedTrade>>, AppError> {
    Ok(Json(state.trades.scanned_for_sender(user).await?))
}

/// GET `/trades/{trade_id}`: full record for a trade party.
pub async fn status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trade_id): Path<Uuid>,
) -> Result<Json<Trade>, AppError> {
    Ok(Json(state.trades.status(user, trade_id).await?))
}

/// POST `/trades/scan-share/{share_token}`: claim a whole share batch.
pub async fn scan_share(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(share_token): Path<String>,
) -> Result<Json<ShareScanned>, AppError> {
    Ok(Json(state.trades.scan_share(user, &share_token).await?))
}

/// POST `/trades/{trade_id}/scan`: bind self as receiver (legacy).
pub async fn scan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trade_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.trades.scan_single(user, trade_id).await?;
    Ok(Json(json!({
        "message": "Trade scanned successfully. Waiting for sender to confirm."
    })))
}

/// POST `/trades/{trade_id}/confirm`: sender completes a scanned trade.
pub async fn confirm(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trade_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.trades.confirm(user, trade_id).await?;
    Ok(Json(json!({
        "message": "Trade confirmed and ownership transferred."
    })))
}

/// POST `/trades/{trade_id}/reject`: sender rejects a trade.
pub async fn reject(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(trade_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.trades.reject(user, trade_id).await?;
    Ok(Json(json!({ "message": "Trade rejected." })))
}
