//! Boundary traits between the editor core and its collaborators.
//!
//! The editor only ever talks to persistence, related-entity listings and
//! schema lookup through these traits, so backends are pluggable and tests
//! run against in-memory implementations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ContentRecord, DocumentRef, MediaFile, RelatedEntitySummary, UploadResponse};
use crate::schema::PageSchema;

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Remote store for documents and media.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Fetch a document. `Ok(None)` means the backend has no such document.
    async fn get_document(&self, doc: &DocumentRef) -> Result<Option<ContentRecord>>;

    /// Replace the stored document with `record` as a whole.
    async fn save_document(&self, doc: &DocumentRef, record: &ContentRecord) -> Result<()>;

    /// Store a media file and return the backend's raw response body.
    async fn upload_media(&self, file: MediaFile) -> Result<UploadResponse>;
}

#[async_trait]
impl<T: PersistenceAdapter + ?Sized> PersistenceAdapter for Arc<T> {
    async fn get_document(&self, doc: &DocumentRef) -> Result<Option<ContentRecord>> {
        (**self).get_document(doc).await
    }

    async fn save_document(&self, doc: &DocumentRef, record: &ContentRecord) -> Result<()> {
        (**self).save_document(doc, record).await
    }

    async fn upload_media(&self, file: MediaFile) -> Result<UploadResponse> {
        (**self).upload_media(file).await
    }
}

// =============================================================================
// RELATED ENTITIES
// =============================================================================

/// Read-only listing of another collection, for related-entity pickers.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn list_entities(&self, collection: &str) -> Result<Vec<RelatedEntitySummary>>;
}

#[async_trait]
impl<T: EntitySource + ?Sized> EntitySource for Arc<T> {
    async fn list_entities(&self, collection: &str) -> Result<Vec<RelatedEntitySummary>> {
        (**self).list_entities(collection).await
    }
}

// =============================================================================
// SCHEMAS
// =============================================================================

/// Pure lookup of document schemas by type name.
pub trait SchemaRegistry: Send + Sync {
    fn get_schema(&self, doc_type: &str) -> Result<Arc<PageSchema>>;

    /// Registered document type names, sorted.
    fn document_types(&self) -> Vec<String>;
}
