//! Represents one QR-code-shareable ownership-transfer offer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UserId;

/// Lifecycle of a trade.
///
/// `pending → scanned → completed` for the two-step single-trade path;
/// share-token batches jump straight from `pending` to `completed` on scan.
/// `rejected` is reachable from `pending` and `scanned`. Expiry is implicit:
/// rows past `expires_at` are excluded from every "active" query and never
/// explicitly transitioned.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, sqlx::Type)]
#[sqlx(type_name = "trade_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Scanned,
    Completed,
    Rejected,
}

/// One ownership-transfer offer for a single art object, sender-initiated.
/// Trades created together as a batch share a `share_token`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Trade {
    pub id: Uuid,
    pub art_object_id: i64,
    pub sender_id: UserId,

    /// Bound on scan; null while the offer is still open to anyone.
    pub receiver_id: Option<UserId>,

    /// Random code binding a batch created together; scanned atomically.
    pub share_token: Option<String>,

    pub status: TradeStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A scanned trade as shown to the sender awaiting confirmation, joined with
/// the art object's media reference.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct ScannedTrade {
    pub trade_id: Uuid,
    pub art_object_id: i64,
    pub sender_id: UserId,
    pub receiver_id: Option<UserId>,
    pub status: TradeStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub file_id: Option<String>,
}
