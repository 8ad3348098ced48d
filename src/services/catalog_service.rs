//! Catalog operations touching the grant/import side of the data model.
//!
//! Metadata edits are routine, except that withdrawing the public flag is a
//! grant revocation: every other user's imported-photo reference to the row
//! must be invalidated and the affected importers notified. Import/remove
//! operations maintain those derived references, gated on effective access.

use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

use crate::{
    models::{
        UserId,
        art_object::{ArtObject, ArtObjectPatch},
    },
    notify::{Event, Notifier},
    services::{ExchangeError, ExchangeResult},
};

const ART_OBJECT_COLUMNS: &str = "id, owner_id, creator_id, file_id, is_original, \
     original_art_id, description, tags, is_public, created_at";

#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
    notifier: Arc<dyn Notifier>,
}

impl CatalogService {
    pub fn new(db: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Apply a typed partial update to an art object's metadata.
    ///
    /// Only fields explicitly set in the patch are written. Flipping
    /// `is_public` to false deletes every other user's imported reference to
    /// the photo inside the same transaction and notifies each of them after
    /// commit.
    pub async fn update_metadata(
        &self,
        owner: UserId,
        photo_id: i64,
        patch: ArtObjectPatch,
    ) -> ExchangeResult<ArtObject> {
        if patch.is_empty() {
            return Err(ExchangeError::Validation("no metadata to update".into()));
        }

        let mut tx = self.db.begin().await?;

        let current: Option<ArtObject> = sqlx::query_as(&format!(
            "SELECT {ART_OBJECT_COLUMNS} FROM art_objects WHERE id = $1 FOR UPDATE"
        ))
        .bind(photo_id)
        .fetch_optional(&mut *tx)
        .await?;
        let current = current.ok_or_else(|| ExchangeError::NotFound("photo not found".into()))?;
        if current.owner_id != owner {
            return Err(ExchangeError::Forbidden(
                "you do not have permission to edit this photo".into(),
            ));
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE art_objects SET ");
        let mut fields = builder.separated(", ");
        if let Some(description) = &patch.description {
            fields.push("description = ");
            fields.push_bind_unseparated(description);
        }
        if let Some(tags) = &patch.tags {
            fields.push("tags = ");
            fields.push_bind_unseparated(tags);
        }
        if let Some(is_public) = patch.is_public {
            fields.push("is_public = ");
            fields.push_bind_unseparated(is_public);
        }
        builder.push(" WHERE id = ");
        builder.push_bind(photo_id);
        builder.push(format!(" RETURNING {ART_OBJECT_COLUMNS}"));

        let updated: ArtObject = builder.build_query_as().fetch_one(&mut *tx).await?;

        let mut affected_importers: Vec<UserId> = Vec::new();
        if patch.is_public == Some(false) {
            affected_importers = sqlx::query_scalar(
                "DELETE FROM imported_photos
                 WHERE photo_id = $1 AND user_id <> $2
                 RETURNING user_id",
            )
            .bind(photo_id)
            .bind(owner)
            .fetch_all(&mut *tx)
            .await?;
            if !affected_importers.is_empty() {
                tracing::info!(
                    "photo {photo_id} made private, dropped {} imported references",
                    affected_importers.len()
                );
            }
        }
        tx.commit().await?;

        tracing::info!("user {owner} updated metadata for photo {photo_id}");
        for importer in affected_importers {
            self.notifier.notify(importer, Event::MaterialsUpdated);
        }
        Ok(updated)
    }

    /// Record an imported-photo reference for the caller.
    ///
    /// Permission is the effective-access union: the object is public, the
    /// owner's whole profile is public, or the photo sits inside the caller's
    /// most recent approved unexpired grant. Older approved grants are not
    /// consulted; a narrower re-approval withdraws what it no longer names.
    pub async fn import_photo(&self, user: UserId, photo_id: i64) -> ExchangeResult<()> {
        let mut tx = self.db.begin().await?;

        let photo: Option<(UserId, bool)> =
            sqlx::query_as("SELECT owner_id, is_public FROM art_objects WHERE id = $1")
                .bind(photo_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (owner_id, is_public) =
            photo.ok_or_else(|| ExchangeError::NotFound("photo not found".into()))?;
        if owner_id == user {
            return Err(ExchangeError::Validation("you already own this photo".into()));
        }

        let has_permission: bool = if is_public {
            true
        } else {
            sqlx::query_scalar(
                "SELECT
                    (SELECT is_public_profile FROM users WHERE id = $1)
                    OR COALESCE((
                        SELECT $3 = ANY(selected_photo_ids)
                        FROM profile_view_requests
                        WHERE requester_id = $2 AND target_id = $1
                        AND status = 'approved'
                        AND cardinality(selected_photo_ids) > 0
                        AND expires_at > now()
                        ORDER BY created_at DESC
                        LIMIT 1
                    ), FALSE)",
            )
            .bind(owner_id)
            .bind(user)
            .bind(photo_id)
            .fetch_one(&mut *tx)
            .await?
        };
        if !has_permission {
            return Err(ExchangeError::Forbidden(
                "you do not have permission to import this photo".into(),
            ));
        }

        let already_imported: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM imported_photos WHERE user_id = $1 AND photo_id = $2)",
        )
        .bind(user)
        .bind(photo_id)
        .fetch_one(&mut *tx)
        .await?;
        if already_imported {
            return Err(ExchangeError::Conflict("photo is already imported".into()));
        }

        sqlx::query("INSERT INTO imported_photos (user_id, photo_id) VALUES ($1, $2)")
            .bind(user)
            .bind(photo_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("user {user} imported photo {photo_id} from user {owner_id}");
        self.notifier.notify(user, Event::MaterialsUpdated);
        Ok(())
    }

    /// Drop the caller's imported reference. The underlying object is not
    /// touched.
    pub async fn remove_imported(&self, user: UserId, photo_id: i64) -> ExchangeResult<()> {
        let deleted =
            sqlx::query("DELETE FROM imported_photos WHERE user_id = $1 AND photo_id = $2")
                .bind(user)
                .bind(photo_id)
                .execute(&self.db)
                .await?
                .rows_affected();
        if deleted == 0 {
            return Err(ExchangeError::NotFound("imported photo not found".into()));
        }

        tracing::info!("user {user} removed imported photo {photo_id}");
        self.notifier.notify(user, Event::MaterialsUpdated);
        Ok(())
    }
}
