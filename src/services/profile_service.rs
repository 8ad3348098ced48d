//! Profile permission state machine.
//!
//! A requester asks a target for view access to their private art objects.
//! The target approves with an explicit photo subset, can later narrow or
//! widen the selection, and can revoke the grant entirely. Approved grants
//! survive new pending requests; only pending requests in the same direction
//! supersede each other. Derived imported-photo rows are invalidated whenever
//! a grant is revoked or narrowed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    models::{
        UserId,
        art_object::ArtObject,
        profile_request::{PendingRequest, ProfileViewRequest, RequestStatus},
        user::User,
    },
    notify::{Event, Notifier},
    services::{ExchangeError, ExchangeResult},
};

const REQUEST_COLUMNS: &str =
    "id, requester_id, target_id, status, selected_photo_ids, created_at, expires_at";

const ART_OBJECT_COLUMNS: &str = "id, owner_id, creator_id, file_id, is_original, \
     original_art_id, description, tags, is_public, created_at";

const USER_COLUMNS: &str = "id, first_name, last_name, username, is_public_profile, created_at";

#[derive(Serialize, Debug)]
pub struct RequestCreated {
    pub request_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, Debug)]
pub struct RequestState {
    pub has_request: bool,
    pub status: Option<RequestStatus>,
    pub request_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Photo ids granted before minus photo ids granted now.
fn removed_ids(old: &[i64], new: &[i64]) -> Vec<i64> {
    old.iter().copied().filter(|id| !new.contains(id)).collect()
}

#[derive(Clone)]
pub struct ProfileService {
    db: PgPool,
    notifier: Arc<dyn Notifier>,
}

impl ProfileService {
    pub fn new(db: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    async fn fetch_user(&self, user_id: UserId) -> ExchangeResult<User> {
        let user: Option<User> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;
        user.ok_or_else(|| ExchangeError::NotFound("user not found".into()))
    }

    async fn responder_name(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: UserId,
    ) -> ExchangeResult<Option<String>> {
        let user: Option<User> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await?;
        Ok(user.and_then(|u| u.display_name()))
    }

    /// Verify the target owns every photo in the selection.
    async fn ensure_all_owned(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        owner: UserId,
        photo_ids: &[i64],
    ) -> ExchangeResult<()> {
        let owned: i64 = sqlx::query_scalar(
            "SELECT count(DISTINCT id) FROM art_objects WHERE id = ANY($1) AND owner_id = $2",
        )
        .bind(photo_ids)
        .bind(owner)
        .fetch_one(&mut **tx)
        .await?;
        let distinct = {
            let mut ids = photo_ids.to_vec();
            ids.sort_unstable();
            ids.dedup();
            ids.len() as i64
        };
        if owned != distinct {
            return Err(ExchangeError::Forbidden(
                "you do not own all of the specified photos".into(),
            ));
        }
        Ok(())
    }

    /// Create a pending view request toward a target user.
    ///
    /// Idempotent: an active pending request in the same direction is
    /// returned unchanged instead of creating a duplicate. Prior pending
    /// requests in this exact direction are superseded; approved grants are
    /// never touched.
    pub async fn create(&self, requester: UserId, target_id: UserId) -> ExchangeResult<RequestCreated> {
        if requester == target_id {
            return Err(ExchangeError::Validation(
                "cannot request access to your own profile".into(),
            ));
        }
        self.fetch_user(target_id).await?;

        let mut tx = self.db.begin().await?;

        let existing: Option<(Uuid, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, created_at, expires_at
             FROM profile_view_requests
             WHERE requester_id = $1 AND target_id = $2
             AND status = 'pending'
             AND expires_at > now()",
        )
        .bind(requester)
        .bind(target_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some((request_id, created_at, expires_at)) = existing {
            tracing::info!(
                "returning existing pending profile request {request_id} from {requester} to {target_id}"
            );
            return Ok(RequestCreated {
                request_id,
                created_at,
                expires_at,
            });
        }

        // close out stale pending rows in this direction before reopening
        let superseded = sqlx::query(
            "UPDATE profile_view_requests
             SET status = 'rejected'
             WHERE requester_id = $1 AND target_id = $2
             AND status = 'pending'",
        )
        .bind(requester)
        .bind(target_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if superseded > 0 {
            tracing::info!(
                "superseded {superseded} pending profile requests from user {requester} to user {target_id}"
            );
        }

        let (request_id, created_at, expires_at): (Uuid, DateTime<Utc>, DateTime<Utc>) =
            sqlx::query_as(
                "INSERT INTO profile_view_requests (requester_id, target_id)
                 VALUES ($1, $2)
                 RETURNING id, created_at, expires_at",
            )
            .bind(requester)
            .bind(target_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("profile view request {request_id} created from {requester} to {target_id}");
        self.notifier.notify(
            target_id,
            Event::ProfileViewRequest {
                requester_id: requester,
                request_id,
            },
        );
        Ok(RequestCreated {
            request_id,
            created_at,
            expires_at,
        })
    }

    /// Target approves (with a non-empty, fully-owned photo subset) or
    /// rejects a pending request.
    pub async fn respond(
        &self,
        target: UserId,
        request_id: Uuid,
        approved: bool,
        photo_ids: &[i64],
    ) -> ExchangeResult<usize> {
        let mut tx = self.db.begin().await?;

        let request: Option<ProfileViewRequest> = sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM profile_view_requests
             WHERE id = $1 AND target_id = $2
             FOR UPDATE"
        ))
        .bind(request_id)
        .bind(target)
        .fetch_optional(&mut *tx)
        .await?;
        let request =
            request.ok_or_else(|| ExchangeError::NotFound("request not found".into()))?;

        if request.status != RequestStatus::Pending {
            tracing::warn!(
                "attempt to respond to non-pending request {request_id}: status {:?}",
                request.status
            );
            return Err(ExchangeError::Conflict(
                "request has already been responded to".into(),
            ));
        }

        if approved {
            if photo_ids.is_empty() {
                return Err(ExchangeError::Validation(
                    "you must select at least one photo to approve the request".into(),
                ));
            }
            Self::ensure_all_owned(&mut tx, target, photo_ids).await?;
        }

        let new_status = if approved {
            RequestStatus::Approved
        } else {
            RequestStatus::Rejected
        };
        let selected: Vec<i64> = if approved { photo_ids.to_vec() } else { Vec::new() };

        sqlx::query(
            "UPDATE profile_view_requests SET status = $1, selected_photo_ids = $2 WHERE id = $3",
        )
        .bind(new_status)
        .bind(&selected)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        let target_user_name = Self::responder_name(&mut tx, target).await?;
        tx.commit().await?;

        tracing::info!("profile request {request_id} {new_status:?} by user {target}");
        let event = if approved {
            Event::ProfileViewApproved {
                target_id: target,
                request_id,
                photo_ids: selected.clone(),
                is_update: false,
                old_photo_ids: Vec::new(),
                target_user_name,
            }
        } else {
            Event::ProfileViewRejected {
                target_id: target,
                request_id,
                target_user_name,
            }
        };
        self.notifier.notify(request.requester_id, event);
        Ok(selected.len())
    }

    /// Replace the photo subset of an approved grant. Photos removed from the
    /// selection lose their imported-photo references on the requester's side.
    pub async fn update_selection(
        &self,
        target: UserId,
        request_id: Uuid,
        photo_ids: &[i64],
    ) -> ExchangeResult<usize> {
        let mut tx = self.db.begin().await?;

        // probe first so the failure mode names what actually went wrong
        let probe: Option<(Uuid, UserId, UserId, RequestStatus)> = sqlx::query_as(
            "SELECT id, target_id, requester_id, status FROM profile_view_requests WHERE id = $1",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (_, probe_target, _, probe_status) =
            probe.ok_or_else(|| ExchangeError::NotFound("permission not found".into()))?;

        let request: Option<ProfileViewRequest> = sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM profile_view_requests
             WHERE id = $1 AND target_id = $2 AND status = 'approved'
             FOR UPDATE"
        ))
        .bind(request_id)
        .bind(target)
        .fetch_optional(&mut *tx)
        .await?;
        let request = match request {
            Some(request) => request,
            None if probe_target != target => {
                return Err(ExchangeError::Forbidden(
                    "you are not authorized to update this permission".into(),
                ));
            }
            None if probe_status != RequestStatus::Approved => {
                return Err(ExchangeError::Conflict("permission is not approved".into()));
            }
            None => {
                return Err(ExchangeError::NotFound("permission not found".into()));
            }
        };

        if photo_ids.is_empty() {
            return Err(ExchangeError::Validation(
                "you must select at least one photo".into(),
            ));
        }
        Self::ensure_all_owned(&mut tx, target, photo_ids).await?;

        let old_photo_ids = request.selected_photo_ids.clone();
        let removed = removed_ids(&old_photo_ids, photo_ids);

        if !removed.is_empty() {
            let deleted = sqlx::query(
                "DELETE FROM imported_photos WHERE user_id = $1 AND photo_id = ANY($2)",
            )
            .bind(request.requester_id)
            .bind(&removed)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            tracing::info!(
                "deleted {deleted} imported photos for user {} after narrowing permission {request_id}",
                request.requester_id
            );
        }

        sqlx::query("UPDATE profile_view_requests SET selected_photo_ids = $1 WHERE id = $2")
            .bind(photo_ids)
            .bind(request_id)
            .execute(&mut *tx)
            .await?;

        let target_user_name = Self::responder_name(&mut tx, target).await?;
        tx.commit().await?;

        tracing::info!("permission {request_id} updated by user {target}");
        self.notifier.notify(
            request.requester_id,
            Event::ProfileViewApproved {
                target_id: target,
                request_id,
                photo_ids: photo_ids.to_vec(),
                is_update: true,
                old_photo_ids,
                target_user_name,
            },
        );
        if !removed.is_empty() {
            self.notifier.notify(request.requester_id, Event::MaterialsUpdated);
        }
        Ok(photo_ids.len())
    }

    /// Revoke an approved grant. Every imported-photo reference the requester
    /// holds against any object the target currently owns is deleted, not
    /// just the originally granted subset.
    pub async fn revoke(&self, target: UserId, request_id: Uuid) -> ExchangeResult<()> {
        let mut tx = self.db.begin().await?;

        let request: Option<ProfileViewRequest> = sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM profile_view_requests
             WHERE id = $1 AND target_id = $2 AND status = 'approved'
             FOR UPDATE"
        ))
        .bind(request_id)
        .bind(target)
        .fetch_optional(&mut *tx)
        .await?;
        let request = request.ok_or_else(|| {
            ExchangeError::NotFound(
                "permission not found or you are not authorized to revoke it".into(),
            )
        })?;

        sqlx::query("UPDATE profile_view_requests SET status = 'rejected' WHERE id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query(
            "DELETE FROM imported_photos
             WHERE user_id = $1 AND photo_id IN (
                 SELECT id FROM art_objects WHERE owner_id = $2
             )",
        )
        .bind(request.requester_id)
        .bind(target)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tracing::info!(
            "deleted {deleted} imported photos for user {} after revoking permission {request_id}",
            request.requester_id
        );

        let target_user_name = Self::responder_name(&mut tx, target).await?;
        tx.commit().await?;

        tracing::info!("permission {request_id} revoked by user {target}");
        self.notifier.notify(
            request.requester_id,
            Event::ProfileViewRejected {
                target_id: target,
                request_id,
                target_user_name,
            },
        );
        self.notifier.notify(request.requester_id, Event::MaterialsUpdated);
        Ok(())
    }

    /// The always-fresh set of the target's objects the requester may view:
    /// the target's public objects plus the selection of the requester's most
    /// recent approved, unexpired request. A fully public profile short-cuts
    /// to all of the target's objects.
    pub async fn effective_access(
        &self,
        requester: UserId,
        target_id: UserId,
    ) -> ExchangeResult<Vec<ArtObject>> {
        let target = self.fetch_user(target_id).await?;

        if target.is_public_profile {
            let photos = sqlx::query_as(&format!(
                "SELECT {ART_OBJECT_COLUMNS} FROM art_objects
                 WHERE owner_id = $1 ORDER BY created_at DESC"
            ))
            .bind(target_id)
            .fetch_all(&self.db)
            .await?;
            return Ok(photos);
        }

        let granted: Option<Vec<i64>> = sqlx::query_scalar(
            "SELECT selected_photo_ids FROM profile_view_requests
             WHERE target_id = $1 AND requester_id = $2 AND status = 'approved'
             AND cardinality(selected_photo_ids) > 0
             AND expires_at > now()
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(target_id)
        .bind(requester)
        .fetch_optional(&self.db)
        .await?;
        let granted = granted.unwrap_or_default();

        let photos = sqlx::query_as(&format!(
            "SELECT {ART_OBJECT_COLUMNS} FROM art_objects
             WHERE owner_id = $1 AND (is_public = TRUE OR id = ANY($2))
             ORDER BY created_at DESC"
        ))
        .bind(target_id)
        .bind(&granted)
        .fetch_all(&self.db)
        .await?;
        Ok(photos)
    }

    /// Pending, unexpired incoming requests for the target, newest first.
    pub async fn pending_for_target(&self, target: UserId) -> ExchangeResult<Vec<PendingRequest>> {
        let requests = sqlx::query_as(
            "SELECT
                pvr.id,
                pvr.requester_id,
                pvr.created_at,
                pvr.expires_at,
                u.first_name,
                u.last_name,
                u.username
             FROM profile_view_requests pvr
             JOIN users u ON pvr.requester_id = u.id
             WHERE pvr.target_id = $1 AND pvr.status = 'pending' AND pvr.expires_at > now()
             ORDER BY pvr.created_at DESC",
        )
        .bind(target)
        .fetch_all(&self.db)
        .await?;
        Ok(requests)
    }

    /// Most recent request from the caller toward a target, any status.
    pub async fn request_status(
        &self,
        requester: UserId,
        target_id: UserId,
    ) -> ExchangeResult<RequestState> {
        let request: Option<(Uuid, RequestStatus, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, status, created_at, expires_at
             FROM profile_view_requests
             WHERE target_id = $1 AND requester_id = $2
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(target_id)
        .bind(requester)
        .fetch_optional(&self.db)
        .await?;

        Ok(match request {
            None => RequestState {
                has_request: false,
                status: None,
                request_id: None,
                created_at: None,
                expires_at: None,
            },
            Some((id, status, created_at, expires_at)) => RequestState {
                has_request: true,
                status: Some(status),
                request_id: Some(id),
                created_at: Some(created_at),
                expires_at: Some(expires_at),
            },
        })
    }
}
