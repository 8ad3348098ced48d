//! Trade state machine.
//!
//! Trades are QR-code-shareable ownership-transfer offers. Two entry paths
//! exist: share-token batches (scan auto-completes every trade bound to the
//! token) and the legacy single-trade path (scan binds the receiver, the
//! sender confirms). Concurrency safety comes entirely from `FOR UPDATE` row
//! locks taken before any status branch; supersession of competing trades
//! happens inside the same transaction, restricted to unexpired rows.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    models::{
        UserId,
        trade::{ScannedTrade, Trade, TradeStatus},
    },
    notify::{Event, Notifier},
    services::{ExchangeError, ExchangeResult},
};

const SHARE_TOKEN_LEN: usize = 8;
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const TRADE_COLUMNS: &str =
    "id, art_object_id, sender_id, receiver_id, share_token, status, created_at, expires_at";

/// Generate a random alphanumeric share token.
fn generate_share_token() -> String {
    let mut rng = rand::thread_rng();
    (0..SHARE_TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

#[derive(Serialize, Debug)]
pub struct ShareCreated {
    pub share_token: String,
    pub trade_count: usize,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, Debug)]
pub struct TradeInitiated {
    pub trade_id: Uuid,
    pub share_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, Debug)]
pub struct ShareScanned {
    pub trade_ids: Vec<Uuid>,
    pub trade_count: usize,
}

#[derive(Clone)]
pub struct TradeService {
    db: PgPool,
    notifier: Arc<dyn Notifier>,
}

impl TradeService {
    pub fn new(db: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Generate a share token that is not currently bound to any trade.
    async fn unique_share_token(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> ExchangeResult<String> {
        loop {
            let token = generate_share_token();
            let taken: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM trades WHERE share_token = $1)")
                    .bind(&token)
                    .fetch_one(&mut **tx)
                    .await?;
            if !taken {
                return Ok(token);
            }
            tracing::debug!("share token collision, regenerating");
        }
    }

    /// Create one pending trade per art object, all bound to a fresh share
    /// token. Other outstanding shares of the caller are left alone; they
    /// run out through `expires_at`.
    pub async fn create_share(
        &self,
        sender: UserId,
        art_object_ids: &[i64],
    ) -> ExchangeResult<ShareCreated> {
        let mut ids = art_object_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Err(ExchangeError::Validation(
                "at least one art object id is required".into(),
            ));
        }

        let owned: i64 =
            sqlx::query_scalar("SELECT count(*) FROM art_objects WHERE id = ANY($1) AND owner_id = $2")
                .bind(&ids)
                .bind(sender)
                .fetch_one(&self.db)
                .await?;
        if owned != ids.len() as i64 {
            return Err(ExchangeError::Forbidden(
                "you do not own all of the specified art objects".into(),
            ));
        }

        let mut tx = self.db.begin().await?;
        let share_token = Self::unique_share_token(&mut tx).await?;

        let mut expires_at = None;
        for art_object_id in &ids {
            let row_expiry: DateTime<Utc> = sqlx::query_scalar(
                "INSERT INTO trades (art_object_id, sender_id, share_token)
                 VALUES ($1, $2, $3)
                 RETURNING expires_at",
            )
            .bind(art_object_id)
            .bind(sender)
            .bind(&share_token)
            .fetch_one(&mut *tx)
            .await?;
            expires_at.get_or_insert(row_expiry);
        }
        tx.commit().await?;

        tracing::info!(
            "created {} trades with share token {} for user {}",
            ids.len(),
            share_token,
            sender
        );

        Ok(ShareCreated {
            share_token,
            trade_count: ids.len(),
            // at least one insert happened, so this is always set
            expires_at: expires_at.unwrap_or_else(Utc::now),
        })
    }

    /// Legacy single-object path. Enforces "one outbound single trade at a
    /// time" by cancelling every other active trade the caller has as sender
    /// before inserting the new offer.
    pub async fn initiate_single(
        &self,
        sender: UserId,
        art_object_id: i64,
    ) -> ExchangeResult<TradeInitiated> {
        let mut tx = self.db.begin().await?;

        let owner: Option<UserId> =
            sqlx::query_scalar("SELECT owner_id FROM art_objects WHERE id = $1")
                .bind(art_object_id)
                .fetch_optional(&mut *tx)
                .await?;
        match owner {
            None => {
                return Err(ExchangeError::NotFound("art object not found".into()));
            }
            Some(owner) if owner != sender => {
                return Err(ExchangeError::Forbidden(
                    "you do not own this art object".into(),
                ));
            }
            Some(_) => {}
        }

        let cancelled = sqlx::query(
            "UPDATE trades
             SET status = 'rejected'
             WHERE sender_id = $1 AND status IN ('pending', 'scanned')
             AND expires_at > now()",
        )
        .bind(sender)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if cancelled > 0 {
            tracing::info!("cancelled {cancelled} old trades for user {sender}");
        }

        let share_token = Self::unique_share_token(&mut tx).await?;
        let (trade_id, expires_at): (Uuid, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO trades (art_object_id, sender_id, share_token)
             VALUES ($1, $2, $3)
             RETURNING id, expires_at",
        )
        .bind(art_object_id)
        .bind(sender)
        .bind(&share_token)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(TradeInitiated {
            trade_id,
            share_token,
            expires_at,
        })
    }

    /// Scan a share token and become the receiver of every trade bound to it.
    ///
    /// Locks every row carrying the token before branching, cancels every
    /// other active trade between the sender/scanner pair, then completes
    /// each pending trade: receiver bound, ownership transferred, history
    /// appended. No separate sender confirmation happens on this path.
    pub async fn scan_share(&self, scanner: UserId, share_token: &str) -> ExchangeResult<ShareScanned> {
        let mut tx = self.db.begin().await?;

        // a scanner that loses the lock race must branch on the winner's
        // committed state, so the whole batch is locked up front
        let all_trades: Vec<Trade> = sqlx::query_as(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE share_token = $1
             ORDER BY created_at DESC
             FOR UPDATE"
        ))
        .bind(share_token)
        .fetch_all(&mut *tx)
        .await?;
        if all_trades.is_empty() {
            return Err(ExchangeError::NotFound(
                "no trades found with this share token".into(),
            ));
        }

        let already_received = all_trades
            .iter()
            .filter(|t| t.receiver_id == Some(scanner) && t.status == TradeStatus::Completed)
            .count();
        if already_received > 0 {
            return Err(ExchangeError::Conflict(format!(
                "you have already received these {already_received} photo(s)"
            )));
        }

        let pending: Vec<&Trade> = all_trades
            .iter()
            .filter(|t| t.status == TradeStatus::Pending && t.expires_at > Utc::now())
            .collect();

        if pending.is_empty() {
            let completed_by_other = all_trades.iter().any(|t| t.status == TradeStatus::Completed);
            if completed_by_other {
                return Err(ExchangeError::Gone(
                    "this share has already been claimed by another user".into(),
                ));
            }
            return Err(ExchangeError::NotFound(
                "no pending trades found with this share token".into(),
            ));
        }

        let sender = pending[0].sender_id;
        if sender == scanner {
            return Err(ExchangeError::Validation("you cannot scan your own trade".into()));
        }

        let keep_ids: Vec<Uuid> = pending.iter().map(|t| t.id).collect();
        self.cancel_competing(&mut tx, sender, scanner, &keep_ids).await?;

        for trade in &pending {
            sqlx::query("UPDATE trades SET status = 'completed', receiver_id = $1 WHERE id = $2")
                .bind(scanner)
                .bind(trade.id)
                .execute(&mut *tx)
                .await?;
            transfer_ownership(&mut tx, trade.art_object_id, sender, scanner).await?;
        }
        tx.commit().await?;

        tracing::info!(
            "user {} scanned and auto-completed {} trades with token {}",
            scanner,
            keep_ids.len(),
            share_token
        );

        self.notifier.notify(sender, Event::MaterialsUpdated);
        self.notifier.notify(scanner, Event::MaterialsUpdated);

        Ok(ShareScanned {
            trade_count: keep_ids.len(),
            trade_ids: keep_ids,
        })
    }

    /// Legacy single-trade scan: binds the receiver and waits for the sender
    /// to confirm. Does not transfer ownership.
    pub async fn scan_single(&self, scanner: UserId, trade_id: Uuid) -> ExchangeResult<()> {
        let mut tx = self.db.begin().await?;
        let trade = lock_trade(&mut tx, trade_id).await?;

        if trade.status != TradeStatus::Pending {
            return Err(ExchangeError::Conflict("this trade is no longer pending".into()));
        }
        if trade.expires_at <= Utc::now() {
            return Err(ExchangeError::Conflict("this trade has expired".into()));
        }
        if trade.sender_id == scanner {
            return Err(ExchangeError::Validation("you cannot trade with yourself".into()));
        }
        if let Some(receiver) = trade.receiver_id {
            if receiver != scanner {
                return Err(ExchangeError::Conflict(
                    "another user has already scanned this trade".into(),
                ));
            }
        }

        self.cancel_competing(&mut tx, trade.sender_id, scanner, &[trade_id]).await?;

        sqlx::query("UPDATE trades SET receiver_id = $1, status = 'scanned' WHERE id = $2")
            .bind(scanner)
            .bind(trade_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Sender confirms a scanned trade: ownership moves to the receiver and
    /// the trade completes.
    pub async fn confirm(&self, sender: UserId, trade_id: Uuid) -> ExchangeResult<()> {
        let mut tx = self.db.begin().await?;
        let trade = lock_trade(&mut tx, trade_id).await?;

        if trade.sender_id != sender {
            return Err(ExchangeError::Forbidden(
                "only the sender can confirm the trade".into(),
            ));
        }
        if trade.status != TradeStatus::Scanned {
            return Err(ExchangeError::Conflict("trade is not awaiting confirmation".into()));
        }
        if trade.expires_at <= Utc::now() {
            return Err(ExchangeError::Conflict("this trade has expired".into()));
        }
        let receiver = trade.receiver_id.ok_or_else(|| {
            ExchangeError::Conflict("trade has no bound receiver".into())
        })?;

        sqlx::query("UPDATE trades SET status = 'completed' WHERE id = $1")
            .bind(trade_id)
            .execute(&mut *tx)
            .await?;
        transfer_ownership(&mut tx, trade.art_object_id, trade.sender_id, receiver).await?;
        tx.commit().await?;

        self.notifier.notify(trade.sender_id, Event::MaterialsUpdated);
        self.notifier.notify(receiver, Event::MaterialsUpdated);
        Ok(())
    }

    /// Sender rejects a pending or scanned trade.
    pub async fn reject(&self, sender: UserId, trade_id: Uuid) -> ExchangeResult<()> {
        let mut tx = self.db.begin().await?;
        let trade = lock_trade(&mut tx, trade_id).await?;

        if trade.sender_id != sender {
            return Err(ExchangeError::Forbidden(
                "only the sender can reject the trade".into(),
            ));
        }
        if !matches!(trade.status, TradeStatus::Pending | TradeStatus::Scanned) {
            return Err(ExchangeError::Conflict("this trade cannot be rejected".into()));
        }

        sqlx::query("UPDATE trades SET status = 'rejected' WHERE id = $1")
            .bind(trade_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.notifier.notify(trade.sender_id, Event::MaterialsUpdated);
        if let Some(receiver) = trade.receiver_id {
            self.notifier.notify(receiver, Event::MaterialsUpdated);
        }
        Ok(())
    }

    /// Full trade record, visible only to its sender or receiver.
    pub async fn status(&self, caller: UserId, trade_id: Uuid) -> ExchangeResult<Trade> {
        let trade: Option<Trade> =
            sqlx::query_as(&format!("SELECT {TRADE_COLUMNS} FROM trades WHERE id = $1"))
                .bind(trade_id)
                .fetch_optional(&self.db)
                .await?;
        let trade = trade.ok_or_else(|| ExchangeError::NotFound("trade not found".into()))?;

        if trade.sender_id != caller && trade.receiver_id != Some(caller) {
            return Err(ExchangeError::Forbidden("you are not part of this trade".into()));
        }
        Ok(trade)
    }

    /// Trades the caller sent that were scanned and await confirmation.
    pub async fn scanned_for_sender(&self, sender: UserId) -> ExchangeResult<Vec<ScannedTrade>> {
        let trades = sqlx::query_as(
            "SELECT
                t.id AS trade_id,
                t.art_object_id,
                t.sender_id,
                t.receiver_id,
                t.status,
                t.created_at,
                t.expires_at,
                ao.file_id
             FROM trades t
             LEFT JOIN art_objects ao ON t.art_object_id = ao.id
             WHERE t.sender_id = $1 AND t.status = 'scanned'
             ORDER BY t.created_at DESC",
        )
        .bind(sender)
        .fetch_all(&self.db)
        .await?;
        Ok(trades)
    }

    /// Cancel every other active trade between the pair, both directions,
    /// including trades whose receiver is still unbound. Rows being committed
    /// in the same call (`keep_ids`) and already-expired rows are untouched.
    async fn cancel_competing(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        sender: UserId,
        scanner: UserId,
        keep_ids: &[Uuid],
    ) -> ExchangeResult<()> {
        let cancelled = sqlx::query(
            "UPDATE trades
             SET status = 'rejected'
             WHERE (
                 (sender_id = $1 AND receiver_id = $2)
                 OR (sender_id = $2 AND receiver_id = $1)
                 OR (sender_id = $1 AND receiver_id IS NULL)
                 OR (sender_id = $2 AND receiver_id IS NULL)
             )
             AND status IN ('pending', 'scanned')
             AND NOT (id = ANY($3))
             AND expires_at > now()",
        )
        .bind(sender)
        .bind(scanner)
        .bind(keep_ids)
        .execute(&mut **tx)
        .await?
        .rows_affected();
        if cancelled > 0 {
            tracing::info!("cancelled {cancelled} competing trades between users {sender} and {scanner}");
        }
        Ok(())
    }
}

/// Move ownership of an art object and append the ledger row. Runs inside
/// the caller's transaction so both succeed or both roll back.
async fn transfer_ownership(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    art_object_id: i64,
    from_user: UserId,
    to_user: UserId,
) -> ExchangeResult<()> {
    let updated = sqlx::query("UPDATE art_objects SET owner_id = $1 WHERE id = $2")
        .bind(to_user)
        .bind(art_object_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();
    if updated == 0 {
        // the object disappeared mid-workflow
        return Err(ExchangeError::NotFound("art object not found".into()));
    }

    sqlx::query(
        "INSERT INTO ownership_history (art_object_id, from_user_id, to_user_id, transaction_type)
         VALUES ($1, $2, $3, 'transfer')",
    )
    .bind(art_object_id)
    .bind(from_user)
    .bind(to_user)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Lock a trade row `FOR UPDATE` before branching on its status.
async fn lock_trade(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    trade_id: Uuid,
) -> ExchangeResult<Trade> {
    let trade: Option<Trade> = sqlx::query_as(&format!(
        "SELECT {TRADE_COLUMNS} FROM trades WHERE id = $1 FOR UPDATE"
    ))
    .bind(trade_id)
    .fetch_optional(&mut **tx)
    .await?;
    trade.ok_or_else(|| ExchangeError::NotFound("trade not found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_tokens_are_fixed_length_uppercase_alphanumeric() {
        for _ in 0..64 {
            let token = generate_share_token();
            assert_eq!(token.len(), SHARE_TOKEN_LEN);
            assert!(token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }
}
