//! Defines routes for the three ownership workflows and their collaborators.
//!
//! ## Structure
//! - **Trades** (QR share batches + legacy single trades)
//!   - `POST /trades/create-share`
//!   - `POST /trades/initiate`
//!   - `GET  /trades/scanned`
//!   - `GET  /trades/{trade_id}`
//!   - `POST /trades/scan-share/{share_token}`
//!   - `POST /trades/{trade_id}/scan` | `/confirm` | `/reject`
//!
//! - **Transfers** (instant copy + confirm-first)
//!   - `POST /transfers/initiate`
//!   - `POST /transfers/pending`
//!   - `POST /transfers/confirm`
//!
//! - **Profile permissions**
//!   - `POST   /profile-requests/create`
//!   - `GET    /profile-requests/pending`
//!   - `GET    /profile-requests/user/{user_id}/request-status`
//!   - `GET    /profile-requests/user/{user_id}/effective-access`
//!   - `POST   /profile-requests/{request_id}/respond`
//!   - `PUT    /profile-requests/{request_id}/update-photos`
//!   - `DELETE /profile-requests/{request_id}/revoke`
//!
//! - **Catalog** (metadata + imported references)
//!   - `PATCH  /art-objects/{photo_id}`
//!   - `POST   /art-objects/{photo_id}/import`
//!   - `DELETE /art-objects/{photo_id}/import`
//!
//! Plus `/healthz`, `/readyz`, and the `/ws/connect` notification socket.

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::{
    handlers::{
        catalog_handlers, health_handlers, profile_handlers, trade_handlers, transfer_handlers,
        ws_handlers,
    },
    state::AppState,
};

/// Build and return the router for all workflow routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(health_handlers::healthz))
        .route("/readyz", get(health_handlers::readyz))
        // notification socket
        .route("/ws/connect", get(ws_handlers::connect))
        // trades
        .route("/trades/create-share", post(trade_handlers::create_share))
        .route("/trades/initiate", post(trade_handlers::initiate))
        .route("/trades/scanned", get(trade_handlers::scanned))
        .route("/trades/{trade_id}", get(trade_handlers::status))
        .route("/trades/scan-share/{share_token}", post(trade_handlers::scan_share))
        .route("/trades/{trade_id}/scan", post(trade_handlers::scan))
        .route("/trades/{trade_id}/confirm", post(trade_handlers::confirm))
        .route("/trades/{trade_id}/reject", post(trade_handlers::reject))
        // transfers
        .route("/transfers/initiate", post(transfer_handlers::initiate))
        .route("/transfers/pending", post(transfer_handlers::create_pending))
        .route("/transfers/confirm", post(transfer_handlers::confirm))
        // profile permissions
        .route("/profile-requests/create", post(profile_handlers::create))
        .route("/profile-requests/pending", get(profile_handlers::pending))
        .route(
            "/profile-requests/user/{user_id}/request-status",
            get(profile_handlers::request_status),
        )
        .route(
            "/profile-requests/user/{user_id}/effective-access",
            get(profile_handlers::effective_access),
        )
        .route(
            "/profile-requests/{request_id}/respond",
            post(profile_handlers::respond),
        )
        .route(
            "/profile-requests/{request_id}/update-photos",
            put(profile_handlers::update_photos),
        )
        .route(
            "/profile-requests/{request_id}/revoke",
            delete(profile_handlers::revoke),
        )
        // catalog
        .route("/art-objects/{photo_id}", patch(catalog_handlers::update_metadata))
        .route(
            "/art-objects/{photo_id}/import",
            post(catalog_handlers::import_photo).delete(catalog_handlers::remove_imported),
        )
}
