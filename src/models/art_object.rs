//! Represents a unique digital art object and its metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UserId;

/// One owned art object. `file_id` is the stable reference into the external
/// media store; `owner_id` is the only field the ownership workflows mutate.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ArtObject {
    pub id: i64,
    pub owner_id: UserId,
    pub creator_id: UserId,

    /// Stable media reference; survives ownership changes and copies.
    pub file_id: String,

    pub is_original: bool,

    /// For copy rows, the id of the row they were copied from.
    pub original_art_id: Option<i64>,

    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// Typed partial update for metadata edits. A field left as `None` is not
/// written; `Some` overwrites, including `Some` of an empty string or list.
#[derive(Deserialize, Default, Debug)]
pub struct ArtObjectPatch {
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

impl ArtObjectPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.tags.is_none() && self.is_public.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_emptiness_tracks_set_fields() {
        assert!(ArtObjectPatch::default().is_empty());
        assert!(
            !ArtObjectPatch {
                is_public: Some(false),
                ..Default::default()
            }
            .is_empty()
        );
        assert!(
            !ArtObjectPatch {
                description: Some(String::new()),
                ..Default::default()
            }
            .is_empty()
        );
    }
}
