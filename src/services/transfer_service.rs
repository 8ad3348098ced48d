//! Transfer state machine.
//!
//! Two independent flows. Instant copy: the scanner presents a photo's stable
//! file reference and immediately receives a copy-row pointing at the same
//! media; no workflow row, no confirmation. Confirm-first: a pending-transfer
//! row with sharer/scanner roles awaits the sharer's accept/reject; its status
//! mutation is race-guarded by a conditional update on the source state
//! instead of an explicit row lock.

use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    models::{
        UserId,
        art_object::ArtObject,
        transfer::{PendingTransfer, TransferStatus},
    },
    notify::{Event, Notifier},
    services::{ExchangeError, ExchangeResult},
};

const TRANSFER_COLUMNS: &str =
    "id, photo_id, sharer_id, scanner_id, status, created_at, expires_at";

const ART_OBJECT_COLUMNS: &str = "id, owner_id, creator_id, file_id, is_original, \
     original_art_id, description, tags, is_public, created_at";

#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
    notifier: Arc<dyn Notifier>,
}

impl TransferService {
    pub fn new(db: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Instant scan-to-copy. The scanner receives a new art-object row that
    /// shares the original's media reference; the original owner keeps their
    /// row. Both parties are notified immediately.
    pub async fn initiate(&self, scanner: UserId, photo_file_id: &str) -> ExchangeResult<ArtObject> {
        // the owning record is the oldest row carrying this reference
        let original: Option<ArtObject> = sqlx::query_as(&format!(
            "SELECT {ART_OBJECT_COLUMNS} FROM art_objects
             WHERE file_id = $1 ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(photo_file_id)
        .fetch_optional(&self.db)
        .await?;
        let original = original.ok_or_else(|| ExchangeError::NotFound("photo not found".into()))?;

        if original.owner_id == scanner {
            return Err(ExchangeError::Validation("you already own this photo".into()));
        }

        let already_has: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM art_objects WHERE file_id = $1 AND owner_id = $2)",
        )
        .bind(photo_file_id)
        .bind(scanner)
        .fetch_one(&self.db)
        .await?;
        if already_has {
            return Err(ExchangeError::Conflict("you already have this photo".into()));
        }

        // TODO: copies are stored with is_original = TRUE; revisit once
        // product decides how duplicate rows should be flagged.
        let copy: ArtObject = sqlx::query_as(&format!(
            "INSERT INTO art_objects (owner_id, creator_id, file_id, is_original, original_art_id)
             VALUES ($1, $1, $2, TRUE, $3)
             RETURNING {ART_OBJECT_COLUMNS}"
        ))
        .bind(scanner)
        .bind(photo_file_id)
        .bind(original.id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            "photo {} copied to user {} from owner {}",
            original.id,
            scanner,
            original.owner_id
        );

        self.notifier.notify(
            original.owner_id,
            Event::TransferCompleted {
                file_id: photo_file_id.to_string(),
                photo_id: None,
            },
        );
        self.notifier.notify(
            scanner,
            Event::TransferCompleted {
                file_id: photo_file_id.to_string(),
                photo_id: Some(copy.id),
            },
        );
        Ok(copy)
    }

    /// Create a confirm-first transfer offer. Any prior unexpired pending
    /// transfer in the same sharer→scanner direction is superseded; the
    /// reverse direction is left alone.
    pub async fn create_pending(
        &self,
        sharer: UserId,
        scanner: UserId,
        photo_id: i64,
    ) -> ExchangeResult<PendingTransfer> {
        if sharer == scanner {
            return Err(ExchangeError::Validation(
                "you cannot transfer a photo to yourself".into(),
            ));
        }

        let mut tx = self.db.begin().await?;

        let owner: Option<UserId> =
            sqlx::query_scalar("SELECT owner_id FROM art_objects WHERE id = $1")
                .bind(photo_id)
                .fetch_optional(&mut *tx)
                .await?;
        match owner {
            None => return Err(ExchangeError::NotFound("photo not found".into())),
            Some(owner) if owner != sharer => {
                return Err(ExchangeError::Forbidden("you do not own this photo".into()));
            }
            Some(_) => {}
        }

        let superseded = sqlx::query(
            "UPDATE pending_transfers
             SET status = 'rejected'
             WHERE sharer_id = $1 AND scanner_id = $2
             AND status = 'pending'
             AND expires_at > now()",
        )
        .bind(sharer)
        .bind(scanner)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if superseded > 0 {
            tracing::info!(
                "superseded {superseded} pending transfers from user {sharer} to user {scanner}"
            );
        }

        let transfer: PendingTransfer = sqlx::query_as(&format!(
            "INSERT INTO pending_transfers (photo_id, sharer_id, scanner_id)
             VALUES ($1, $2, $3)
             RETURNING {TRANSFER_COLUMNS}"
        ))
        .bind(photo_id)
        .bind(sharer)
        .bind(scanner)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(transfer)
    }

    /// Sharer accepts or rejects a pending transfer. On accept, ownership
    /// moves to the scanner and the ledger is appended in the same
    /// transaction. The status flip is guarded by `WHERE status = 'pending'`;
    /// a concurrent decision loses the race and surfaces as Conflict.
    pub async fn confirm(
        &self,
        sharer: UserId,
        transfer_id: Uuid,
        accept: bool,
    ) -> ExchangeResult<TransferStatus> {
        let mut tx = self.db.begin().await?;

        let transfer: Option<PendingTransfer> = sqlx::query_as(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM pending_transfers WHERE id = $1"
        ))
        .bind(transfer_id)
        .fetch_optional(&mut *tx)
        .await?;
        let transfer =
            transfer.ok_or_else(|| ExchangeError::NotFound("transfer request not found".into()))?;

        if transfer.sharer_id != sharer {
            return Err(ExchangeError::Forbidden(
                "you are not authorized to confirm this transfer".into(),
            ));
        }
        if transfer.status != TransferStatus::Pending {
            return Err(ExchangeError::Conflict(format!(
                "transfer request is already {:?}",
                transfer.status
            )));
        }
        if transfer.expires_at <= Utc::now() {
            return Err(ExchangeError::Conflict("transfer request has expired".into()));
        }

        let new_status = if accept {
            TransferStatus::Accepted
        } else {
            TransferStatus::Rejected
        };
        let flipped = sqlx::query(
            "UPDATE pending_transfers
             SET status = $1
             WHERE id = $2 AND status = 'pending'",
        )
        .bind(new_status)
        .bind(transfer_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if flipped == 0 {
            return Err(ExchangeError::Conflict(
                "transfer request was decided concurrently".into(),
            ));
        }

        if accept {
            let updated = sqlx::query("UPDATE art_objects SET owner_id = $1 WHERE id = $2")
                .bind(transfer.scanner_id)
                .bind(transfer.photo_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if updated == 0 {
                return Err(ExchangeError::NotFound("photo not found".into()));
            }
            sqlx::query(
                "INSERT INTO ownership_history (art_object_id, from_user_id, to_user_id, transaction_type)
                 VALUES ($1, $2, $3, 'transfer')",
            )
            .bind(transfer.photo_id)
            .bind(transfer.sharer_id)
            .bind(transfer.scanner_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(
            "transfer {} {} by sharer {}",
            transfer_id,
            if accept { "accepted" } else { "rejected" },
            sharer
        );

        let event = Event::TransferStatus {
            transfer_id,
            status: new_status,
            photo_id: transfer.photo_id,
        };
        self.notifier.notify(transfer.sharer_id, event.clone());
        self.notifier.notify(transfer.scanner_id, event);
        Ok(new_status)
    }
}
