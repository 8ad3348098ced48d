//! Shared fixtures for the workflow integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sqlx::PgPool;

use art_exchange::{
    models::UserId,
    notify::{Event, Notifier},
    services::{
        catalog_service::CatalogService, profile_service::ProfileService,
        trade_service::TradeService, transfer_service::TransferService,
    },
};

/// Notifier stub that records every event instead of delivering it.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(UserId, Event)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(UserId, Event)> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_for(&self, user_id: UserId) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(recipient, _)| *recipient == user_id)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, user_id: UserId, event: Event) {
        self.events.lock().unwrap().push((user_id, event));
    }
}

pub fn trade_service(pool: &PgPool) -> (TradeService, Arc<RecordingNotifier>) {
    let notifier = RecordingNotifier::new();
    (TradeService::new(pool.clone(), notifier.clone()), notifier)
}

pub fn transfer_service(pool: &PgPool) -> (TransferService, Arc<RecordingNotifier>) {
    let notifier = RecordingNotifier::new();
    (TransferService::new(pool.clone(), notifier.clone()), notifier)
}

pub fn profile_service(pool: &PgPool) -> (ProfileService, Arc<RecordingNotifier>) {
    let notifier = RecordingNotifier::new();
    (ProfileService::new(pool.clone(), notifier.clone()), notifier)
}

pub fn catalog_service(pool: &PgPool) -> (CatalogService, Arc<RecordingNotifier>) {
    let notifier = RecordingNotifier::new();
    (CatalogService::new(pool.clone(), notifier.clone()), notifier)
}

pub async fn seed_user(pool: &PgPool, id: UserId, first_name: &str) -> UserId {
    sqlx::query("INSERT INTO users (id, first_name) VALUES ($1, $2)")
        .bind(id)
        .bind(first_name)
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn seed_public_user(pool: &PgPool, id: UserId, first_name: &str) -> UserId {
    sqlx::query("INSERT INTO users (id, first_name, is_public_profile) VALUES ($1, $2, TRUE)")
        .bind(id)
        .bind(first_name)
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn seed_art_object(pool: &PgPool, owner: UserId, file_id: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO art_objects (owner_id, creator_id, file_id) VALUES ($1, $1, $2) RETURNING id",
    )
    .bind(owner)
    .bind(file_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn seed_public_art_object(pool: &PgPool, owner: UserId, file_id: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO art_objects (owner_id, creator_id, file_id, is_public)
         VALUES ($1, $1, $2, TRUE) RETURNING id",
    )
    .bind(owner)
    .bind(file_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn owner_of(pool: &PgPool, art_object_id: i64) -> UserId {
    sqlx::query_scalar("SELECT owner_id FROM art_objects WHERE id = $1")
        .bind(art_object_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn history_count(pool: &PgPool, art_object_id: i64) -> i64 {
    sqlx::query_scalar("SELECT count(*) FROM ownership_history WHERE art_object_id = $1")
        .bind(art_object_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn is_imported(pool: &PgPool, user: UserId, photo_id: i64) -> bool {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM imported_photos WHERE user_id = $1 AND photo_id = $2)",
    )
    .bind(user)
    .bind(photo_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn import_directly(pool: &PgPool, user: UserId, photo_id: i64) {
    sqlx::query("INSERT INTO imported_photos (user_id, photo_id) VALUES ($1, $2)")
        .bind(user)
        .bind(photo_id)
        .execute(pool)
        .await
        .unwrap();
}
