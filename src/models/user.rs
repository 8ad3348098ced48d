//! Represents a user as mirrored from the upstream identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UserId;

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct User {
    pub id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,

    /// Public profiles expose every owned object without a grant.
    pub is_public_profile: bool,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Human-readable name for notification payloads. Joins the name parts,
    /// trims, and yields `None` when both are absent or blank.
    pub fn display_name(&self) -> Option<String> {
        let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
