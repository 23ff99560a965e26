//! Photo upload integration tests.

use vet_records_core::forms::{FormContext, PatientForm, SubmitError};
use vet_records_core::models::Sex;
use vet_records_core::notify::{messages, ChannelNotifier, NotificationLevel};
use vet_records_core::services::{
    delete_pet_photo, upload_pet_photo, PhotoError, PhotoFile, PhotoPolicy,
};
use vet_records_core::store::{FsBlobStore, MemoryBlobStore, SqliteTableStore};

fn jpeg(size: usize) -> PhotoFile {
    PhotoFile {
        file_name: "rex.jpg".to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0xFF; size],
    }
}

fn form() -> PatientForm {
    let mut form = PatientForm::new();
    form.name = "Rex".to_string();
    form.species = "dog".to_string();
    form.breed = "Labrador".to_string();
    form.age = "3".to_string();
    form.weight = "30".to_string();
    form.sex = Sex::Male;
    form
}

#[tokio::test]
async fn test_oversized_photo_rejected_locally() {
    let blobs = MemoryBlobStore::new();
    let (notifier, mut rx) = ChannelNotifier::new();
    let mut form = form();

    let result = form
        .attach_photo(&blobs, &PhotoPolicy::default(), &notifier, jpeg(6 * 1024 * 1024))
        .await;

    assert!(matches!(
        result,
        Err(SubmitError::Photo(PhotoError::TooLarge { limit, .. })) if limit == 5 * 1024 * 1024
    ));
    assert_eq!(blobs.upload_count(), 0);
    assert!(form.photo_url.is_none());

    let notification = rx.try_recv().unwrap();
    assert_eq!(notification.level, NotificationLevel::Error);
    assert_eq!(notification.description, "A foto deve ter no máximo 5 MB.");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_configured_limit_in_message() {
    let blobs = MemoryBlobStore::new();
    let (notifier, mut rx) = ChannelNotifier::new();
    let policy = PhotoPolicy {
        max_bytes: 1024 * 1024,
        ..PhotoPolicy::default()
    };
    let mut form = form();

    let result = form.attach_photo(&blobs, &policy, &notifier, jpeg(2 * 1024 * 1024)).await;
    assert!(matches!(result, Err(SubmitError::Photo(PhotoError::TooLarge { .. }))));
    assert_eq!(
        rx.try_recv().unwrap().description,
        messages::photo_too_large(1024 * 1024)
    );
    assert_eq!(blobs.upload_count(), 0);
}

#[tokio::test]
async fn test_new_patient_photo_uses_one_draft_key() {
    let blobs = MemoryBlobStore::new();
    let (notifier, _rx) = ChannelNotifier::new();
    let policy = PhotoPolicy::default();
    let mut form = form();

    let first = form.attach_photo(&blobs, &policy, &notifier, jpeg(10)).await.unwrap();
    let second = form.attach_photo(&blobs, &policy, &notifier, jpeg(20)).await.unwrap();
    assert_eq!(first, second);
    assert!(first.starts_with("memory://pets/pet-photos/"));
    assert!(first.ends_with(".jpg"));
    assert_eq!(blobs.upload_count(), 2);
}

#[tokio::test]
async fn test_photo_url_persisted_on_save() {
    let store = SqliteTableStore::open_in_memory().unwrap();
    let blobs = MemoryBlobStore::new();
    let (notifier, _rx) = ChannelNotifier::new();
    let ctx = FormContext::new(&store, &notifier);

    let created = form().submit(&ctx).await.unwrap();
    assert!(created.photo_url.is_none());

    let mut edit = PatientForm::edit(&created);
    let url = edit
        .attach_photo(&blobs, &PhotoPolicy::default(), &notifier, jpeg(100))
        .await
        .unwrap();
    assert_eq!(url, format!("memory://pets/pet-photos/{}.jpg", created.id));

    let saved = edit.submit(&ctx).await.unwrap();
    assert_eq!(saved.photo_url.as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn test_directory_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = FsBlobStore::new(dir.path());
    let policy = PhotoPolicy {
        bucket: "clinic".to_string(),
        max_bytes: 1024,
    };

    let url = upload_pet_photo(&blobs, &policy, "p-7", jpeg(512)).await.unwrap();
    let stored = dir.path().join("clinic").join("pet-photos").join("p-7.jpg");
    assert!(url.ends_with("p-7.jpg"));
    assert_eq!(std::fs::read(&stored).unwrap().len(), 512);

    delete_pet_photo(&blobs, &policy, &url).await.unwrap();
    assert!(!stored.exists());

    // Removing again is not an error.
    delete_pet_photo(&blobs, &policy, &url).await.unwrap();
}
