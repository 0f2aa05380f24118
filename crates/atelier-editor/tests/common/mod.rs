//! Shared fixtures for editor integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;

use atelier_client::MemoryBackend;
use atelier_core::{
    ContentRecord, DocumentRef, EventBus, FieldKind, FieldSchema, MediaFile, PageSchema,
    SectionSchema, StructShape,
};
use atelier_editor::{EditSession, SessionConfig};

pub fn doc() -> DocumentRef {
    DocumentRef::new("article", "first")
}

/// Small schema touching every field kind.
pub fn schema() -> Arc<PageSchema> {
    Arc::new(
        PageSchema::new("article", "Article")
            .section(
                SectionSchema::new("main", "Main")
                    .field(FieldSchema::new("title", "Title", FieldKind::Text).required())
                    .field(FieldSchema::new("summary", "Summary", FieldKind::Textarea))
                    .field(FieldSchema::new("year", "Year", FieldKind::Number))
                    .field(FieldSchema::new("featured", "Featured", FieldKind::Boolean))
                    .field(FieldSchema::new(
                        "hero",
                        "Hero",
                        FieldKind::DualImage {
                            desktop_key: "hero_desktop".into(),
                            mobile_key: "hero_mobile".into(),
                        },
                    )),
            )
            .section(
                SectionSchema::new("media", "Media")
                    .field(FieldSchema::new("gallery", "Gallery", FieldKind::ImageArray).with_max_items(4))
                    .field(FieldSchema::new(
                        "shots",
                        "Screens",
                        FieldKind::DualImageArray {
                            desktop_key: "shots_desktop".into(),
                            mobile_key: "shots_mobile".into(),
                        },
                    )),
            )
            .section(
                SectionSchema::new("story", "Story")
                    .field(
                        FieldSchema::new(
                            "steps",
                            "Process steps",
                            FieldKind::StructArray {
                                shape: StructShape::ProcessSteps,
                            },
                        )
                        .with_max_items(2),
                    )
                    .field(
                        FieldSchema::new(
                            "related",
                            "Related works",
                            FieldKind::RelatedEntities {
                                collection: "works".into(),
                            },
                        )
                        .with_max_items(3),
                    )
                    .field(FieldSchema::new(
                        "typography",
                        "Typography",
                        FieldKind::NestedGroup {
                            fields: vec!["heading_font".into(), "body_font".into()],
                        },
                    )),
            ),
    )
}

pub fn record(value: Value) -> ContentRecord {
    ContentRecord::from_value(value).unwrap()
}

/// A file whose bytes carry a PNG signature.
pub fn png(name: &str) -> MediaFile {
    MediaFile::new(
        name,
        vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13],
    )
}

pub async fn open(backend: &MemoryBackend) -> EditSession {
    open_with_events(backend, Arc::new(EventBus::default())).await
}

pub async fn open_with_events(backend: &MemoryBackend, events: Arc<EventBus>) -> EditSession {
    let mut session = EditSession::new(
        doc(),
        schema(),
        Arc::new(backend.clone()),
        SessionConfig::default().with_events(events),
    );
    session.load().await.unwrap();
    session.load_related(backend).await;
    session
}
