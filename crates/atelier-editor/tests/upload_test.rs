//! Upload coordination: isolation, supersession, stale slots and reloads.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use atelier_client::{MemoryBackend, UploadReply};
use atelier_core::defaults;
use atelier_core::{
    ContentRecord, DocumentRef, Error, EventBus, FieldValue, MediaFile, MediaVariant,
    PersistenceAdapter, Result, UploadResponse, UploadStatus,
};
use atelier_editor::{EditSession, MediaAddress, SessionConfig, UploadResolution};

use common::{doc, open, open_with_events, png, record, schema};

fn list(items: &[&str]) -> Option<FieldValue> {
    Some(FieldValue::List(items.iter().map(|s| s.to_string()).collect()))
}

fn text(value: &str) -> Option<FieldValue> {
    Some(FieldValue::Text(value.to_string()))
}

#[tokio::test]
async fn test_scalar_upload_writes_location() {
    let backend = MemoryBackend::new();
    let mut session = open(&backend).await;

    let address = MediaAddress::scalar().with_variant(MediaVariant::Desktop);
    let task_id = session.on_media_select("hero", address, png("cover.png")).unwrap();
    assert_eq!(session.pending_uploads().len(), 1);

    let resolution = session.next_upload().await.unwrap();
    assert_eq!(resolution.task().id, task_id);
    assert!(matches!(resolution, UploadResolution::Applied { .. }));
    assert_eq!(session.value("hero_desktop"), text("memory://uploads/1/cover.png"));
    assert_eq!(session.value("hero_mobile"), text(""));
    assert!(session.pending_uploads().is_empty());
}

#[tokio::test]
async fn test_failed_upload_leaves_other_slot_and_prior_value() {
    let backend = MemoryBackend::new()
        .with_document(doc(), record(json!({"gallery": ["a.png", "b.png"]})));
    backend.fail_upload("broken.png", 500, None);
    let mut session = open(&backend).await;

    session
        .on_media_select("gallery", MediaAddress::element(0), png("fresh.png"))
        .unwrap();
    session
        .on_media_select("gallery", MediaAddress::element(1), png("broken.png"))
        .unwrap();

    let resolutions = session.settle_uploads().await;
    assert_eq!(resolutions.len(), 2);

    let failed = resolutions
        .iter()
        .find_map(|r| match r {
            UploadResolution::Failed { message, .. } => Some(message.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(failed, defaults::UPLOAD_FAILED_MESSAGE);

    let gallery = session.value("gallery").unwrap();
    let gallery = gallery.as_list().unwrap();
    assert!(gallery[0].ends_with("/fresh.png"));
    assert_eq!(gallery[1], "b.png");
}

#[tokio::test]
async fn test_failure_carries_server_reason_and_is_user_visible() {
    let backend = MemoryBackend::new()
        .with_document(doc(), record(json!({"hero_desktop": "old.png"})));
    backend.fail_upload("huge.png", 413, Some("File too large"));
    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();
    let mut session = open_with_events(&backend, events).await;

    let address = MediaAddress::scalar().with_variant(MediaVariant::Desktop);
    session.on_media_select("hero", address, png("huge.png")).unwrap();

    match session.next_upload().await.unwrap() {
        UploadResolution::Failed { message, task } => {
            assert_eq!(message, "File too large");
            assert_eq!(task.status, UploadStatus::Failed);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(session.value("hero_desktop"), text("old.png"));

    let notice = std::iter::from_fn(|| rx.try_recv().ok())
        .find(|e| e.event_type == "upload.failed")
        .unwrap();
    assert!(notice.payload.is_user_visible());
}

#[tokio::test]
async fn test_upload_targets_surviving_element_after_removal() {
    let backend = MemoryBackend::new()
        .with_document(doc(), record(json!({"gallery": ["a", "b", "c"]})));
    backend.hold_upload("late.png");
    let mut session = open(&backend).await;

    session
        .on_media_select("gallery", MediaAddress::element(2), png("late.png"))
        .unwrap();
    session.on_array_remove("gallery", 1).unwrap();
    assert_eq!(session.value("gallery"), list(&["a", "c"]));

    backend.release_upload("late.png");
    let resolution = session.next_upload().await.unwrap();
    assert!(matches!(resolution, UploadResolution::Applied { .. }));
    assert_eq!(
        session.value("gallery"),
        list(&["a", "memory://uploads/1/late.png"])
    );
}

#[tokio::test]
async fn test_upload_for_removed_element_is_discarded() {
    let backend = MemoryBackend::new()
        .with_document(doc(), record(json!({"gallery": ["a", "b", "c"]})));
    backend.hold_upload("gone.png");
    let mut session = open(&backend).await;

    session
        .on_media_select("gallery", MediaAddress::element(1), png("gone.png"))
        .unwrap();
    session.on_array_remove("gallery", 1).unwrap();
    assert!(session.pending_uploads().is_empty());

    backend.release_upload("gone.png");
    let resolution = session.next_upload().await.unwrap();
    assert!(matches!(resolution, UploadResolution::Discarded { .. }));
    assert_eq!(session.value("gallery"), list(&["a", "c"]));
}

#[tokio::test]
async fn test_newer_upload_supersedes_pending_one() {
    let backend = MemoryBackend::new();
    backend.hold_upload("first.png");
    let mut session = open(&backend).await;
    let address = MediaAddress::scalar().with_variant(MediaVariant::Mobile);

    session.on_media_select("hero", address, png("first.png")).unwrap();
    session.on_media_select("hero", address, png("second.png")).unwrap();
    assert_eq!(session.pending_uploads().len(), 1);

    let applied = session.next_upload().await.unwrap();
    assert!(matches!(applied, UploadResolution::Applied { .. }));

    backend.release_upload("first.png");
    let late = session.next_upload().await.unwrap();
    assert!(matches!(late, UploadResolution::Discarded { .. }));
    assert!(session.next_upload().await.is_none());

    let mobile = session.value("hero_mobile").unwrap();
    assert!(mobile.as_text().unwrap().ends_with("/second.png"));
}

#[tokio::test]
async fn test_direct_edit_supersedes_pending_upload() {
    let backend = MemoryBackend::new();
    backend.hold_upload("slow.png");
    let mut session = open(&backend).await;

    let address = MediaAddress::scalar().with_variant(MediaVariant::Desktop);
    session.on_media_select("hero", address, png("slow.png")).unwrap();
    session
        .on_field_change("hero_desktop", json!("https://cdn.example.com/pasted.png"))
        .unwrap();

    backend.release_upload("slow.png");
    let resolution = session.next_upload().await.unwrap();
    assert!(matches!(resolution, UploadResolution::Discarded { .. }));
    assert_eq!(
        session.value("hero_desktop"),
        text("https://cdn.example.com/pasted.png")
    );
}

#[tokio::test]
async fn test_reload_discards_results_from_previous_load() {
    let backend = MemoryBackend::new();
    backend.hold_upload("old-epoch.png");
    let mut session = open(&backend).await;

    let address = MediaAddress::scalar().with_variant(MediaVariant::Desktop);
    session
        .on_media_select("hero", address, png("old-epoch.png"))
        .unwrap();
    session.load().await.unwrap();

    backend.release_upload("old-epoch.png");
    match session.next_upload().await.unwrap() {
        UploadResolution::Discarded { reason, .. } => assert_eq!(reason, "document was reloaded"),
        other => panic!("expected discard, got {:?}", other),
    }
    assert_eq!(session.value("hero_desktop"), text(""));
}

#[tokio::test]
async fn test_location_probing_and_missing_location() {
    let nested = MemoryBackend::new().with_upload_reply(UploadReply::Nested("secure_url".into()));
    let mut session = open(&nested).await;
    session
        .on_media_select("hero", MediaAddress::scalar().with_variant(MediaVariant::Desktop), png("n.png"))
        .unwrap();
    session.settle_uploads().await;
    assert_eq!(session.value("hero_desktop"), text("memory://uploads/1/n.png"));

    let missing = MemoryBackend::new().with_upload_reply(UploadReply::Missing);
    let mut session = open(&missing).await;
    session
        .on_media_select("hero", MediaAddress::scalar().with_variant(MediaVariant::Desktop), png("m.png"))
        .unwrap();
    match session.next_upload().await.unwrap() {
        UploadResolution::Failed { message, .. } => {
            assert_eq!(message, defaults::UPLOAD_NO_LOCATION_MESSAGE)
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(session.value("hero_desktop"), text(""));
}

#[tokio::test]
async fn test_unsafe_or_misaddressed_files_start_no_task() {
    let backend = MemoryBackend::new()
        .with_document(doc(), record(json!({"gallery": ["a"]})));
    let mut session = open(&backend).await;

    let exe = MediaFile::new("setup.exe", b"MZ\x90\x00".to_vec());
    assert!(matches!(
        session.on_media_select("gallery", MediaAddress::element(0), exe),
        Err(Error::UnsafeFile(_))
    ));
    let empty = MediaFile::new("empty.png", vec![]);
    assert!(matches!(
        session.on_media_select("gallery", MediaAddress::element(0), empty),
        Err(Error::UnsafeFile(_))
    ));
    assert!(matches!(
        session.on_media_select("gallery", MediaAddress::element(5), png("x.png")),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        session.on_media_select("title", MediaAddress::scalar(), png("x.png")),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        session.on_media_select("hero", MediaAddress::scalar(), png("x.png")),
        Err(Error::InvalidInput(_))
    ));

    assert!(session.pending_uploads().is_empty());
    assert_eq!(backend.call_count("upload_media"), 0);
}

#[tokio::test]
async fn test_submit_waits_for_pending_uploads() {
    let backend = MemoryBackend::new();
    backend.hold_upload("hero.png");
    let mut session = open(&backend).await;

    session.on_field_change("title", json!("Acme")).unwrap();
    let address = MediaAddress::scalar().with_variant(MediaVariant::Desktop);
    session.on_media_select("hero", address, png("hero.png")).unwrap();

    let releaser = backend.clone();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        releaser.release_upload("hero.png");
    });
    session.submit().await.unwrap();

    let saved = backend.document(&doc()).unwrap();
    assert_eq!(saved.get("hero_desktop"), Some(&json!("memory://uploads/1/hero.png")));
    assert!(backend
        .calls()
        .iter()
        .any(|c| c.operation == "upload_media" && c.target == "hero.png"));
    assert!(matches!(
        session.on_field_change("title", json!("Later")),
        Err(Error::InvalidState(_))
    ));
}

/// Stores documents in memory but crashes on every upload.
struct CrashingUploads(MemoryBackend);

#[async_trait]
impl PersistenceAdapter for CrashingUploads {
    async fn get_document(&self, doc: &DocumentRef) -> Result<Option<ContentRecord>> {
        self.0.get_document(doc).await
    }

    async fn save_document(&self, doc: &DocumentRef, record: &ContentRecord) -> Result<()> {
        self.0.save_document(doc, record).await
    }

    async fn upload_media(&self, file: MediaFile) -> Result<UploadResponse> {
        panic!("storage driver crashed on {}", file.filename);
    }
}

#[tokio::test]
async fn test_panicking_upload_fails_its_slot_and_submit_completes() {
    let backend = MemoryBackend::new();
    let mut session = EditSession::new(
        doc(),
        schema(),
        Arc::new(CrashingUploads(backend.clone())),
        SessionConfig::default(),
    );
    session.load().await.unwrap();
    session.on_field_change("title", json!("Acme")).unwrap();

    let address = MediaAddress::scalar().with_variant(MediaVariant::Desktop);
    session.on_media_select("hero", address, png("first.png")).unwrap();
    let resolution = tokio::time::timeout(Duration::from_secs(5), session.next_upload())
        .await
        .expect("upload resolution should not hang")
        .unwrap();
    match resolution {
        UploadResolution::Failed { message, task } => {
            assert_eq!(message, defaults::UPLOAD_FAILED_MESSAGE);
            assert_eq!(task.status, UploadStatus::Failed);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(session.value("hero_desktop"), text(""));

    session.on_media_select("hero", address, png("second.png")).unwrap();
    tokio::time::timeout(Duration::from_secs(5), session.submit())
        .await
        .expect("submit should not hang")
        .unwrap();
    assert_eq!(backend.document(&doc()), Some(record(json!({"title": "Acme"}))));
}
