//! Integration tests for the transfer state machine.

mod common;

use common::*;

use art_exchange::{
    models::transfer::TransferStatus,
    notify::Event,
    services::ExchangeError,
};
use sqlx::PgPool;
use uuid::Uuid;

async fn transfer_status(pool: &PgPool, transfer_id: Uuid) -> TransferStatus {
    sqlx::query_scalar("SELECT status FROM pending_transfers WHERE id = $1")
        .bind(transfer_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test]
async fn instant_copy_creates_linked_row_for_scanner(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let scanner = seed_user(&pool, 2, "Bob").await;
    let original = seed_art_object(&pool, owner, "file-a").await;

    let (transfers, notifier) = transfer_service(&pool);
    let copy = transfers.initiate(scanner, "file-a").await.unwrap();

    assert_eq!(copy.owner_id, scanner);
    assert_eq!(copy.file_id, "file-a");
    assert_eq!(copy.original_art_id, Some(original));
    // the owner keeps their row
    assert_eq!(owner_of(&pool, original).await, owner);

    assert_eq!(
        notifier.events_for(owner),
        vec![Event::TransferCompleted {
            file_id: "file-a".into(),
            photo_id: None,
        }]
    );
    assert_eq!(
        notifier.events_for(scanner),
        vec![Event::TransferCompleted {
            file_id: "file-a".into(),
            photo_id: Some(copy.id),
        }]
    );
}

#[sqlx::test]
async fn owner_cannot_copy_their_own_photo(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    seed_art_object(&pool, owner, "file-a").await;

    let (transfers, _) = transfer_service(&pool);
    let err = transfers.initiate(owner, "file-a").await.unwrap_err();
    assert!(matches!(err, ExchangeError::Validation(_)));
}

#[sqlx::test]
async fn copying_the_same_photo_twice_is_a_conflict(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let scanner = seed_user(&pool, 2, "Bob").await;
    seed_art_object(&pool, owner, "file-a").await;

    let (transfers, _) = transfer_service(&pool);
    transfers.initiate(scanner, "file-a").await.unwrap();
    let err = transfers.initiate(scanner, "file-a").await.unwrap_err();
    assert!(matches!(err, ExchangeError::Conflict(_)));
}

#[sqlx::test]
async fn unknown_file_reference_is_not_found(pool: PgPool) {
    let scanner = seed_user(&pool, 1, "Bob").await;
    let (transfers, _) = transfer_service(&pool);
    let err = transfers.initiate(scanner, "no-such-file").await.unwrap_err();
    assert!(matches!(err, ExchangeError::NotFound(_)));
}

#[sqlx::test]
async fn accepted_transfer_moves_ownership_and_writes_history(pool: PgPool) {
    let sharer = seed_user(&pool, 1, "Alice").await;
    let scanner = seed_user(&pool, 2, "Bob").await;
    let photo = seed_art_object(&pool, sharer, "file-a").await;

    let (transfers, notifier) = transfer_service(&pool);
    let pending = transfers.create_pending(sharer, scanner, photo).await.unwrap();
    assert_eq!(pending.status, TransferStatus::Pending);

    let decided = transfers.confirm(sharer, pending.id, true).await.unwrap();
    assert_eq!(decided, TransferStatus::Accepted);
    assert_eq!(owner_of(&pool, photo).await, scanner);
    assert_eq!(history_count(&pool, photo).await, 1);

    let expected = Event::TransferStatus {
        transfer_id: pending.id,
        status: TransferStatus::Accepted,
        photo_id: photo,
    };
    assert_eq!(notifier.events_for(sharer), vec![expected.clone()]);
    assert_eq!(notifier.events_for(scanner), vec![expected]);
}

#[sqlx::test]
async fn rejected_transfer_leaves_ownership_alone(pool: PgPool) {
    let sharer = seed_user(&pool, 1, "Alice").await;
    let scanner = seed_user(&pool, 2, "Bob").await;
    let photo = seed_art_object(&pool, sharer, "file-a").await;

    let (transfers, _) = transfer_service(&pool);
    let pending = transfers.create_pending(sharer, scanner, photo).await.unwrap();
    let decided = transfers.confirm(sharer, pending.id, false).await.unwrap();

    assert_eq!(decided, TransferStatus::Rejected);
    assert_eq!(owner_of(&pool, photo).await, sharer);
    assert_eq!(history_count(&pool, photo).await, 0);
}

#[sqlx::test]
async fn only_the_sharer_can_decide_a_transfer(pool: PgPool) {
    let sharer = seed_user(&pool, 1, "Alice").await;
    let scanner = seed_user(&pool, 2, "Bob").await;
    let photo = seed_art_object(&pool, sharer, "file-a").await;

    let (transfers, _) = transfer_service(&pool);
    let pending = transfers.create_pending(sharer, scanner, photo).await.unwrap();

    let err = transfers.confirm(scanner, pending.id, true).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Forbidden(_)));
    assert_eq!(owner_of(&pool, photo).await, sharer);
}

#[sqlx::test]
async fn deciding_twice_is_a_conflict(pool: PgPool) {
    let sharer = seed_user(&pool, 1, "Alice").await;
    let scanner = seed_user(&pool, 2, "Bob").await;
    let photo = seed_art_object(&pool, sharer, "file-a").await;

    let (transfers, _) = transfer_service(&pool);
    let pending = transfers.create_pending(sharer, scanner, photo).await.unwrap();
    transfers.confirm(sharer, pending.id, false).await.unwrap();

    let err = transfers.confirm(sharer, pending.id, true).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Conflict(_)));
    assert_eq!(owner_of(&pool, photo).await, sharer);
}

#[sqlx::test]
async fn new_offer_supersedes_pending_one_in_same_direction(pool: PgPool) {
    let sharer = seed_user(&pool, 1, "Alice").await;
    let scanner = seed_user(&pool, 2, "Bob").await;
    let first = seed_art_object(&pool, sharer, "file-a").await;
    let second = seed_art_object(&pool, sharer, "file-b").await;

    let (transfers, _) = transfer_service(&pool);
    let old = transfers.create_pending(sharer, scanner, first).await.unwrap();
    let new = transfers.create_pending(sharer, scanner, second).await.unwrap();

    assert_eq!(transfer_status(&pool, old.id).await, TransferStatus::Rejected);
    assert_eq!(transfer_status(&pool, new.id).await, TransferStatus::Pending);

    // the superseded offer can no longer be accepted
    let err = transfers.confirm(sharer, old.id, true).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Conflict(_)));
}

#[sqlx::test]
async fn reverse_direction_offers_coexist(pool: PgPool) {
    let alice = seed_user(&pool, 1, "Alice").await;
    let bob = seed_user(&pool, 2, "Bob").await;
    let from_alice = seed_art_object(&pool, alice, "file-a").await;
    let from_bob = seed_art_object(&pool, bob, "file-b").await;

    let (transfers, _) = transfer_service(&pool);
    let forward = transfers.create_pending(alice, bob, from_alice).await.unwrap();
    let backward = transfers.create_pending(bob, alice, from_bob).await.unwrap();

    assert_eq!(transfer_status(&pool, forward.id).await, TransferStatus::Pending);
    assert_eq!(transfer_status(&pool, backward.id).await, TransferStatus::Pending);
}

#[sqlx::test]
async fn self_transfer_is_rejected(pool: PgPool) {
    let sharer = seed_user(&pool, 1, "Alice").await;
    let photo = seed_art_object(&pool, sharer, "file-a").await;

    let (transfers, _) = transfer_service(&pool);
    let err = transfers.create_pending(sharer, sharer, photo).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Validation(_)));
}

#[sqlx::test]
async fn only_the_owner_can_offer_a_transfer(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let interloper = seed_user(&pool, 2, "Bob").await;
    let scanner = seed_user(&pool, 3, "Carol").await;
    let photo = seed_art_object(&pool, owner, "file-a").await;

    let (transfers, _) = transfer_service(&pool);
    let err = transfers
        .create_pending(interloper, scanner, photo)
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::Forbidden(_)));
}

#[sqlx::test]
async fn deciding_a_transfer_does_not_touch_its_expiry(pool: PgPool) {
    let sharer = seed_user(&pool, 1, "Alice").await;
    let scanner = seed_user(&pool, 2, "Bob").await;
    let photo = seed_art_object(&pool, sharer, "file-a").await;

    let (transfers, _) = transfer_service(&pool);
    let pending = transfers.create_pending(sharer, scanner, photo).await.unwrap();
    transfers.confirm(sharer, pending.id, true).await.unwrap();

    let expires_at: chrono::DateTime<chrono::Utc> =
        sqlx::query_scalar("SELECT expires_at FROM pending_transfers WHERE id = $1")
            .bind(pending.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(expires_at, pending.expires_at);
}

#[sqlx::test]
async fn expired_transfer_cannot_be_decided(pool: PgPool) {
    let sharer = seed_user(&pool, 1, "Alice").await;
    let scanner = seed_user(&pool, 2, "Bob").await;
    let photo = seed_art_object(&pool, sharer, "file-a").await;

    let (transfers, _) = transfer_service(&pool);
    let pending = transfers.create_pending(sharer, scanner, photo).await.unwrap();
    sqlx::query("UPDATE pending_transfers SET expires_at = now() - INTERVAL '1 minute' WHERE id = $1")
        .bind(pending.id)
        .execute(&pool)
        .await
        .unwrap();

    let err = transfers.confirm(sharer, pending.id, true).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Conflict(_)));
    assert_eq!(owner_of(&pool, photo).await, sharer);
}
