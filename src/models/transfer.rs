//! Represents a confirm-first transfer offer, distinct from trades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UserId;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, sqlx::Type)]
#[sqlx(type_name = "transfer_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A transfer offer awaiting the sharer's decision. Unlike trades, roles are
/// fixed at creation: the scanner asked, the sharer confirms or rejects.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct PendingTransfer {
    pub id: Uuid,
    pub photo_id: i64,
    pub sharer_id: UserId,
    pub scanner_id: UserId,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
