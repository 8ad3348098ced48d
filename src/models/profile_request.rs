//! Represents a requester→target grant of view access to private art objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UserId;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A profile view request. The selected photo subset is set on approval and
/// stays mutable afterwards; rejection (including revocation of an approved
/// grant) clears nothing retroactively except derived imported-photo rows.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ProfileViewRequest {
    pub id: Uuid,
    pub requester_id: UserId,
    pub target_id: UserId,
    pub status: RequestStatus,

    /// Photo ids the target granted; empty unless the request is approved.
    pub selected_photo_ids: Vec<i64>,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A pending incoming request joined with requester display fields.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct PendingRequest {
    pub id: Uuid,
    pub requester_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}
