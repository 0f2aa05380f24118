//! In-memory backend for tests and offline use.
//!
//! Stores documents and collections in process memory, logs every call and
//! can be told to fail or to hold uploads until released, which makes upload
//! ordering deterministic in tests.
//!
//! ```rust
//! use atelier_client::memory::MemoryBackend;
//! use atelier_core::{ContentRecord, DocumentRef};
//!
//! let backend = MemoryBackend::new()
//!     .with_document(DocumentRef::new("works", "acme"), ContentRecord::new())
//!     .with_upload_reply(atelier_client::memory::UploadReply::Field("secure_url".into()));
//! assert_eq!(backend.call_count("get_document"), 0);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;
use tracing::debug;

use atelier_core::{
    ContentRecord, DocumentRef, EntitySource, Error, MediaFile, PersistenceAdapter,
    RelatedEntitySummary, Result, UploadResponse,
};

/// Shape of the body returned for a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadReply {
    /// `{"<field>": location}`
    Field(String),
    /// `{"data": {"<field>": location}}`
    Nested(String),
    /// `{"id": n}`: no location at all.
    Missing,
}

impl Default for UploadReply {
    fn default() -> Self {
        Self::Field("url".to_string())
    }
}

/// One recorded backend call.
#[derive(Debug, Clone)]
pub struct BackendCall {
    pub operation: &'static str,
    /// Document, filename or collection the call addressed.
    pub target: String,
    pub timestamp: Instant,
}

#[derive(Debug, Default)]
struct Failures {
    get: Option<String>,
    save: VecDeque<(u16, Option<String>)>,
    uploads: HashMap<String, (u16, Option<String>)>,
    collections: HashMap<String, String>,
}

/// In-memory [`PersistenceAdapter`] and [`EntitySource`].
///
/// Clones share state, so a test can keep a handle while a session owns
/// another.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    documents: Arc<Mutex<HashMap<DocumentRef, ContentRecord>>>,
    collections: Arc<Mutex<HashMap<String, Vec<RelatedEntitySummary>>>>,
    failures: Arc<Mutex<Failures>>,
    gates: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
    reply: Arc<Mutex<UploadReply>>,
    call_log: Arc<Mutex<Vec<BackendCall>>>,
    upload_seq: Arc<AtomicU64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, doc: DocumentRef, record: ContentRecord) -> Self {
        lock(&self.documents).insert(doc, record);
        self
    }

    pub fn with_collection(self, name: impl Into<String>, summaries: Vec<RelatedEntitySummary>) -> Self {
        lock(&self.collections).insert(name.into(), summaries);
        self
    }

    pub fn with_upload_reply(self, reply: UploadReply) -> Self {
        *lock(&self.reply) = reply;
        self
    }

    /// Make every `get_document` fail as a transport error.
    pub fn fail_gets(&self, message: impl Into<String>) {
        lock(&self.failures).get = Some(message.into());
    }

    /// Reject the next `save_document` with `status` and an optional reason.
    pub fn fail_next_save(&self, status: u16, reason: Option<&str>) {
        lock(&self.failures)
            .save
            .push_back((status, reason.map(str::to_string)));
    }

    /// Reject uploads of `filename` with `status` and an optional reason.
    pub fn fail_upload(&self, filename: impl Into<String>, status: u16, reason: Option<&str>) {
        lock(&self.failures)
            .uploads
            .insert(filename.into(), (status, reason.map(str::to_string)));
    }

    /// Make `list_entities(collection)` fail.
    pub fn fail_collection(&self, collection: impl Into<String>, message: impl Into<String>) {
        lock(&self.failures)
            .collections
            .insert(collection.into(), message.into());
    }

    pub fn clear_failures(&self) {
        *lock(&self.failures) = Failures::default();
    }

    /// Hold uploads of `filename` until [`release_upload`](Self::release_upload).
    pub fn hold_upload(&self, filename: impl Into<String>) {
        lock(&self.gates).insert(filename.into(), Arc::new(Semaphore::new(0)));
    }

    /// Let one held upload of `filename` proceed.
    pub fn release_upload(&self, filename: &str) {
        if let Some(gate) = lock(&self.gates).get(filename) {
            gate.add_permits(1);
        }
    }

    /// Stored document, e.g. to assert on what a submit saved.
    pub fn document(&self, doc: &DocumentRef) -> Option<ContentRecord> {
        lock(&self.documents).get(doc).cloned()
    }

    /// All logged calls.
    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.call_log).clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.call_log)
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        lock(&self.call_log).clear()
    }

    fn log_call(&self, operation: &'static str, target: impl Into<String>) {
        let target = target.into();
        debug!(op = operation, target = %target, "Memory backend call");
        lock(&self.call_log).push(BackendCall {
            operation,
            target,
            timestamp: Instant::now(),
        });
    }

    fn upload_body(&self, location: String) -> Value {
        let member = |field: &str| {
            let mut map = Map::new();
            map.insert(field.to_string(), Value::String(location.clone()));
            Value::Object(map)
        };
        match &*lock(&self.reply) {
            UploadReply::Field(field) => member(field),
            UploadReply::Nested(field) => json!({ "data": member(field) }),
            UploadReply::Missing => json!({ "id": self.upload_seq.load(Ordering::SeqCst) }),
        }
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryBackend {
    async fn get_document(&self, doc: &DocumentRef) -> Result<Option<ContentRecord>> {
        self.log_call("get_document", doc.to_string());
        if let Some(message) = lock(&self.failures).get.clone() {
            return Err(Error::Request(message));
        }
        Ok(lock(&self.documents).get(doc).cloned())
    }

    async fn save_document(&self, doc: &DocumentRef, record: &ContentRecord) -> Result<()> {
        self.log_call("save_document", doc.to_string());
        if let Some((status, reason)) = lock(&self.failures).save.pop_front() {
            return Err(Error::Rejected { status, reason });
        }
        lock(&self.documents).insert(doc.clone(), record.clone());
        Ok(())
    }

    async fn upload_media(&self, file: MediaFile) -> Result<UploadResponse> {
        self.log_call("upload_media", file.filename.clone());

        let gate = lock(&self.gates).get(&file.filename).cloned();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| Error::Upload(format!("Upload gate closed: {}", e)))?;
            permit.forget();
        }

        let failure = lock(&self.failures).uploads.get(&file.filename).cloned();
        if let Some((status, reason)) = failure {
            return Err(Error::Rejected { status, reason });
        }

        let seq = self.upload_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let location = format!("memory://uploads/{}/{}", seq, file.filename);
        Ok(UploadResponse(self.upload_body(location)))
    }
}

#[async_trait]
impl EntitySource for MemoryBackend {
    async fn list_entities(&self, collection: &str) -> Result<Vec<RelatedEntitySummary>> {
        self.log_call("list_entities", collection);
        if let Some(message) = lock(&self.failures).collections.get(collection).cloned() {
            return Err(Error::Request(message));
        }
        Ok(lock(&self.collections)
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }
}
