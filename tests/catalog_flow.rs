//! Integration tests for catalog metadata and imported references.

mod common;

use common::*;

use art_exchange::{
    models::art_object::ArtObjectPatch,
    notify::Event,
    services::ExchangeError,
};
use sqlx::PgPool;

#[sqlx::test]
async fn patch_writes_only_the_set_fields(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let photo = seed_art_object(&pool, owner, "file-a").await;
    sqlx::query("UPDATE art_objects SET tags = $1 WHERE id = $2")
        .bind(vec!["landscape".to_string()])
        .bind(photo)
        .execute(&pool)
        .await
        .unwrap();

    let (catalog, _) = catalog_service(&pool);
    let updated = catalog
        .update_metadata(
            owner,
            photo,
            ArtObjectPatch {
                description: Some("sunset".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.description.as_deref(), Some("sunset"));
    // untouched fields survive the partial update
    assert_eq!(updated.tags, Some(vec!["landscape".to_string()]));
    assert!(!updated.is_public);
}

#[sqlx::test]
async fn empty_patch_is_rejected(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let photo = seed_art_object(&pool, owner, "file-a").await;

    let (catalog, _) = catalog_service(&pool);
    let err = catalog
        .update_metadata(owner, photo, ArtObjectPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::Validation(_)));
}

#[sqlx::test]
async fn only_the_owner_can_edit_metadata(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let other = seed_user(&pool, 2, "Bob").await;
    let photo = seed_art_object(&pool, owner, "file-a").await;

    let (catalog, _) = catalog_service(&pool);
    let patch = ArtObjectPatch {
        description: Some("mine now".into()),
        ..Default::default()
    };
    let err = catalog.update_metadata(other, photo, patch).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Forbidden(_)));

    let err = catalog
        .update_metadata(
            owner,
            999,
            ArtObjectPatch {
                description: Some("ghost".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::NotFound(_)));
}

#[sqlx::test]
async fn making_a_photo_private_drops_other_users_imports(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let importer = seed_user(&pool, 2, "Bob").await;
    let photo = seed_public_art_object(&pool, owner, "file-a").await;
    import_directly(&pool, importer, photo).await;

    let (catalog, notifier) = catalog_service(&pool);
    let updated = catalog
        .update_metadata(
            owner,
            photo,
            ArtObjectPatch {
                is_public: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!updated.is_public);
    assert!(!is_imported(&pool, importer, photo).await);
    assert_eq!(notifier.events_for(importer), vec![Event::MaterialsUpdated]);
}

#[sqlx::test]
async fn importing_a_public_photo_succeeds(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let importer = seed_user(&pool, 2, "Bob").await;
    let photo = seed_public_art_object(&pool, owner, "file-a").await;

    let (catalog, notifier) = catalog_service(&pool);
    catalog.import_photo(importer, photo).await.unwrap();

    assert!(is_imported(&pool, importer, photo).await);
    assert_eq!(notifier.events_for(importer), vec![Event::MaterialsUpdated]);
}

#[sqlx::test]
async fn importing_a_private_photo_without_a_grant_is_forbidden(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let importer = seed_user(&pool, 2, "Bob").await;
    let photo = seed_art_object(&pool, owner, "file-a").await;

    let (catalog, _) = catalog_service(&pool);
    let err = catalog.import_photo(importer, photo).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Forbidden(_)));
    assert!(!is_imported(&pool, importer, photo).await);
}

#[sqlx::test]
async fn a_grant_containing_the_photo_allows_import(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let importer = seed_user(&pool, 2, "Bob").await;
    let photo = seed_art_object(&pool, owner, "file-a").await;

    let (profiles, _) = profile_service(&pool);
    let created = profiles.create(importer, owner).await.unwrap();
    profiles
        .respond(owner, created.request_id, true, &[photo])
        .await
        .unwrap();

    let (catalog, _) = catalog_service(&pool);
    catalog.import_photo(importer, photo).await.unwrap();
    assert!(is_imported(&pool, importer, photo).await);
}

#[sqlx::test]
async fn a_narrower_reapproval_blocks_imports_outside_it(pool: PgPool) {
    let importer = seed_user(&pool, 1, "Alice").await;
    let owner = seed_user(&pool, 2, "Bob").await;
    let kept = seed_art_object(&pool, owner, "file-a").await;
    let dropped = seed_art_object(&pool, owner, "file-b").await;

    let (profiles, _) = profile_service(&pool);
    let first = profiles.create(importer, owner).await.unwrap();
    profiles
        .respond(owner, first.request_id, true, &[kept, dropped])
        .await
        .unwrap();

    // a later, narrower grant becomes the current one
    let second = profiles.create(importer, owner).await.unwrap();
    assert_ne!(first.request_id, second.request_id);
    profiles
        .respond(owner, second.request_id, true, &[kept])
        .await
        .unwrap();

    let (catalog, _) = catalog_service(&pool);
    let err = catalog.import_photo(importer, dropped).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Forbidden(_)));
    assert!(!is_imported(&pool, importer, dropped).await);

    catalog.import_photo(importer, kept).await.unwrap();
    assert!(is_imported(&pool, importer, kept).await);
}

#[sqlx::test]
async fn a_public_profile_allows_import_of_private_photos(pool: PgPool) {
    let owner = seed_public_user(&pool, 1, "Alice").await;
    let importer = seed_user(&pool, 2, "Bob").await;
    let photo = seed_art_object(&pool, owner, "file-a").await;

    let (catalog, _) = catalog_service(&pool);
    catalog.import_photo(importer, photo).await.unwrap();
    assert!(is_imported(&pool, importer, photo).await);
}

#[sqlx::test]
async fn importing_twice_is_a_conflict(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let importer = seed_user(&pool, 2, "Bob").await;
    let photo = seed_public_art_object(&pool, owner, "file-a").await;

    let (catalog, _) = catalog_service(&pool);
    catalog.import_photo(importer, photo).await.unwrap();
    let err = catalog.import_photo(importer, photo).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Conflict(_)));
}

#[sqlx::test]
async fn importing_your_own_photo_is_rejected(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let photo = seed_public_art_object(&pool, owner, "file-a").await;

    let (catalog, _) = catalog_service(&pool);
    let err = catalog.import_photo(owner, photo).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Validation(_)));
}

#[sqlx::test]
async fn removing_an_import_only_touches_the_reference(pool: PgPool) {
    let owner = seed_user(&pool, 1, "Alice").await;
    let importer = seed_user(&pool, 2, "Bob").await;
    let photo = seed_public_art_object(&pool, owner, "file-a").await;
    import_directly(&pool, importer, photo).await;

    let (catalog, _) = catalog_service(&pool);
    catalog.remove_imported(importer, photo).await.unwrap();

    assert!(!is_imported(&pool, importer, photo).await);
    assert_eq!(owner_of(&pool, photo).await, owner);

    let err = catalog.remove_imported(importer, photo).await.unwrap_err();
    assert!(matches!(err, ExchangeError::NotFound(_)));
}
