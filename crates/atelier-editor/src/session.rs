//! Schema-driven form engine.
//!
//! An [`EditSession`] owns one document's record, its schema and its upload
//! tasks. Every edit takes `&mut self`, so edits never interleave; upload
//! transfers run in the background and their results are written when the
//! session drains them ([`EditSession::process_uploads`],
//! [`EditSession::next_upload`], [`EditSession::settle_uploads`]).
//!
//! ```text
//! Loading ──► Ready ──► Submitting ──► Submitted
//!               ▲            │
//!               └── SubmitFailed ◄┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use atelier_core::{
    defaults, ContentRecord, DocumentRef, EditorEvent, EntitySource, Error, EventBus, EventEnvelope,
    FieldKind, FieldValue, MediaFile, MediaVariant, Operation, PageSchema, PersistenceAdapter,
    RelatedEntitySummary, Result, SchemaRegistry, TaskId, UploadTarget,
};

use crate::form::{field_views, resolve_value, FieldView};
use crate::store::{ContentStore, Mutation, MutationOutcome};
use crate::uploads::{UploadCoordinator, UploadResolution, UploadTask};
use crate::validation::validate;

/// Lifecycle of an edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    Ready,
    Submitting,
    Submitted,
    SubmitFailed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
            Self::SubmitFailed => "submit_failed",
        }
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Loading, Ready)
                | (Ready, Loading)
                | (Ready, Submitting)
                | (Submitting, Submitted)
                | (Submitting, SubmitFailed)
                | (SubmitFailed, Ready)
                | (SubmitFailed, Loading)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the initial fetch went. Every outcome hydrates the form; a missing or
/// unreadable document starts from an empty record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Found,
    NotFound,
    /// The fetch failed; carries the user-facing reason.
    Failed(String),
}

impl LoadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::NotFound => "not_found",
            Self::Failed(_) => "failed",
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which image a media selection is for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaAddress {
    /// Half of a dual field; `None` for single-image kinds.
    pub variant: Option<MediaVariant>,
    /// Element index for array kinds.
    pub index: Option<usize>,
}

impl MediaAddress {
    pub fn scalar() -> Self {
        Self::default()
    }

    pub fn element(index: usize) -> Self {
        Self {
            variant: None,
            index: Some(index),
        }
    }

    pub fn with_variant(mut self, variant: MediaVariant) -> Self {
        self.variant = Some(variant);
        self
    }
}

/// Session tunables.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `ATELIER_UPLOAD_MAX_BYTES` | 25 MB | Largest file accepted for upload |
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_upload_bytes: u64,
    pub upload_timeout: Duration,
    pub events: Arc<EventBus>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: defaults::UPLOAD_MAX_BYTES,
            upload_timeout: Duration::from_secs(defaults::UPLOAD_TIMEOUT_SECS),
            events: Arc::new(EventBus::default()),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let max_upload_bytes = std::env::var(defaults::ENV_UPLOAD_MAX_BYTES)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::UPLOAD_MAX_BYTES);
        Self {
            max_upload_bytes,
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }
}

/// Kind and limits governing one record key.
struct Target {
    kind: FieldKind,
    label: String,
    max_items: Option<usize>,
}

/// Editing session for one document.
pub struct EditSession {
    document: DocumentRef,
    schema: Arc<PageSchema>,
    adapter: Arc<dyn PersistenceAdapter>,
    store: ContentStore,
    uploads: UploadCoordinator,
    state: SessionState,
    load_outcome: Option<LoadOutcome>,
    related: BTreeMap<String, Vec<RelatedEntitySummary>>,
    events: Arc<EventBus>,
}

impl EditSession {
    /// Create a session in `Loading` state with an empty record.
    pub fn new(
        document: DocumentRef,
        schema: Arc<PageSchema>,
        adapter: Arc<dyn PersistenceAdapter>,
        config: SessionConfig,
    ) -> Self {
        let uploads = UploadCoordinator::new(Arc::clone(&adapter))
            .with_max_file_bytes(config.max_upload_bytes)
            .with_timeout(config.upload_timeout);
        Self {
            document,
            schema,
            adapter,
            store: ContentStore::new(),
            uploads,
            state: SessionState::Loading,
            load_outcome: None,
            related: BTreeMap::new(),
            events: config.events,
        }
    }

    /// Look up the schema, load the document and, when a source is given,
    /// the related-entity summaries.
    pub async fn open(
        registry: &dyn SchemaRegistry,
        adapter: Arc<dyn PersistenceAdapter>,
        entities: Option<&dyn EntitySource>,
        document: DocumentRef,
        config: SessionConfig,
    ) -> Result<Self> {
        let schema = registry.get_schema(&document.doc_type)?;
        let mut session = Self::new(document, schema, adapter, config);
        session.load().await?;
        if let Some(source) = entities {
            session.load_related(source).await;
        }
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Fetch the document and hydrate the form.
    ///
    /// Reloading starts a new epoch: results of uploads started before the
    /// reload are discarded when they arrive.
    #[instrument(
        skip(self),
        fields(subsystem = "editor", component = "session", op = "load", document = %self.document)
    )]
    pub async fn load(&mut self) -> Result<LoadOutcome> {
        if self.state != SessionState::Loading {
            self.ensure(self.state.can_transition_to(SessionState::Loading), "reload")?;
            self.transition(SessionState::Loading);
        }

        let start = Instant::now();
        let (record, outcome) = match self.adapter.get_document(&self.document).await {
            Ok(Some(record)) => (record, LoadOutcome::Found),
            Ok(None) => (ContentRecord::new(), LoadOutcome::NotFound),
            Err(e) => {
                warn!(error = %e, "Document fetch failed, starting from an empty record");
                (ContentRecord::new(), LoadOutcome::Failed(e.user_message()))
            }
        };

        let epoch = self.store.load(record);
        info!(
            outcome = %outcome,
            epoch,
            duration_ms = start.elapsed().as_millis() as u64,
            "Document loaded"
        );
        self.emit(EditorEvent::DocumentLoaded {
            outcome: outcome.as_str().to_string(),
            message: outcome.message().map(str::to_string),
        });
        self.load_outcome = Some(outcome.clone());
        self.transition(SessionState::Ready);
        Ok(outcome)
    }

    /// Fetch summaries for every related-entities collection of the schema.
    ///
    /// Collections are fetched concurrently. A failing collection is left
    /// empty and reported; the form stays usable.
    pub async fn load_related(&mut self, source: &dyn EntitySource) {
        let schema = Arc::clone(&self.schema);
        let collections = schema.related_collections();
        let fetched = join_all(collections.iter().map(|c| source.list_entities(c))).await;
        for (collection, result) in collections.into_iter().zip(fetched) {
            let summaries = match result {
                Ok(summaries) => {
                    debug!(collection, count = summaries.len(), "Related entities loaded");
                    summaries
                }
                Err(e) => {
                    warn!(collection, error = %e, "Related entities unavailable");
                    self.emit(EditorEvent::RelatedEntitiesUnavailable {
                        collection: collection.to_string(),
                        message: e.user_message(),
                    });
                    Vec::new()
                }
            };
            self.related.insert(collection.to_string(), summaries);
        }
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    pub fn schema(&self) -> &PageSchema {
        &self.schema
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn load_outcome(&self) -> Option<&LoadOutcome> {
        self.load_outcome.as_ref()
    }

    pub fn snapshot(&self) -> Arc<ContentRecord> {
        self.store.snapshot()
    }

    /// Typed value under a record key; see [`resolve_value`].
    pub fn value(&self, record_key: &str) -> Option<FieldValue> {
        resolve_value(&self.schema, &self.store.snapshot(), record_key)
    }

    /// Every field with its control and current value, in schema order.
    pub fn fields(&self) -> Vec<FieldView<'_>> {
        field_views(&self.schema, &self.store.snapshot())
    }

    /// Summaries loaded for `collection`; empty when unavailable.
    pub fn related(&self, collection: &str) -> &[RelatedEntitySummary] {
        self.related.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pending_uploads(&self) -> Vec<&UploadTask> {
        self.uploads.pending().collect()
    }

    pub fn upload_task(&self, id: TaskId) -> Option<&UploadTask> {
        self.uploads.task(id)
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    /// Replace a scalar value (text, textarea, number, boolean, image).
    pub fn on_field_change(&mut self, key: &str, value: Value) -> Result<MutationOutcome> {
        let target = self.target(key, Operation::Set)?;
        if !target.kind.accepts(&value) {
            return Err(Error::InvalidInput(format!(
                "{} cannot hold {}",
                target.label, value
            )));
        }
        if matches!(target.kind, FieldKind::Image) {
            self.uploads.supersede(&UploadTarget::scalar(key));
        }
        self.mutate(key, Mutation::Set(value))
    }

    /// Append a blank element: `""` for images, the default struct for
    /// struct arrays.
    pub fn on_array_add(&mut self, key: &str) -> Result<MutationOutcome> {
        let target = self.target(key, Operation::Append)?;
        let len = self.len_of(key, &target.kind);
        if let Some(max) = target.max_items {
            if len >= max {
                return Err(Error::InvalidInput(format!(
                    "{} allows at most {} items",
                    target.label, max
                )));
            }
        }
        let item = match &target.kind {
            FieldKind::StructArray { shape } => Value::Object(shape.default_item()),
            _ => Value::String(String::new()),
        };
        self.mutate(key, Mutation::Append(item))
    }

    pub fn on_array_remove(&mut self, key: &str, index: usize) -> Result<MutationOutcome> {
        self.target(key, Operation::RemoveAt)?;
        if let Some(slot) = self.store.slot_at(key, index) {
            self.uploads.supersede(&UploadTarget::element(key, slot));
        }
        self.mutate(key, Mutation::RemoveAt(index))
    }

    /// Replace one image of an image array, e.g. with a pasted URL.
    pub fn on_array_set(&mut self, key: &str, index: usize, value: impl Into<String>) -> Result<MutationOutcome> {
        self.target(key, Operation::SetAt)?;
        if let Some(slot) = self.store.slot_at(key, index) {
            self.uploads.supersede(&UploadTarget::element(key, slot));
        }
        self.mutate(key, Mutation::SetAt(index, Value::String(value.into())))
    }

    pub fn on_struct_update(
        &mut self,
        key: &str,
        index: usize,
        member: &str,
        value: impl Into<String>,
    ) -> Result<MutationOutcome> {
        let target = self.target(key, Operation::UpdateField)?;
        if let FieldKind::StructArray { shape } = &target.kind {
            if !shape.has_member(member) {
                return Err(Error::InvalidInput(format!(
                    "{} has no member '{}'",
                    target.label, member
                )));
            }
        }
        self.mutate(
            key,
            Mutation::UpdateField {
                index,
                field: member.to_string(),
                value: Value::String(value.into()),
            },
        )
    }

    pub fn on_group_change(&mut self, key: &str, member: &str, value: Value) -> Result<MutationOutcome> {
        let target = self.target(key, Operation::SetField)?;
        if let FieldKind::NestedGroup { fields } = &target.kind {
            if !fields.is_empty() && !fields.iter().any(|f| f == member) {
                return Err(Error::InvalidInput(format!(
                    "{} has no member '{}'",
                    target.label, member
                )));
            }
        }
        self.mutate(
            key,
            Mutation::SetField {
                field: member.to_string(),
                value,
            },
        )
    }

    /// Add or remove a related entity id. Adding respects `max_items`.
    pub fn on_related_toggle(&mut self, key: &str, entity_id: &str) -> Result<MutationOutcome> {
        let target = self.target(key, Operation::Toggle)?;
        let current = FieldValue::coerce(&target.kind, self.store.snapshot().get(key));
        let selected = current
            .as_list()
            .is_some_and(|ids| ids.iter().any(|id| id == entity_id));
        if let (false, Some(max)) = (selected, target.max_items) {
            if current.len().unwrap_or(0) >= max {
                return Err(Error::InvalidInput(format!(
                    "{} allows at most {} items",
                    target.label, max
                )));
            }
        }
        self.mutate(key, Mutation::Toggle(entity_id.to_string()))
    }

    /// Start uploading `file` into an image slot. Returns immediately; the
    /// location is written when the upload's completion is drained.
    pub fn on_media_select(&mut self, field_key: &str, address: MediaAddress, file: MediaFile) -> Result<TaskId> {
        let record_key = match address.variant {
            Some(variant) => {
                let field = self.schema.field(field_key).ok_or_else(|| {
                    Error::InvalidInput(format!("'{}' is not a field of {}", field_key, self.schema.name))
                })?;
                field
                    .kind
                    .variant_key(variant)
                    .ok_or_else(|| {
                        Error::InvalidInput(format!("{} has no {} variant", field.label, variant))
                    })?
                    .to_string()
            }
            None => field_key.to_string(),
        };

        let upload_target = match address.index {
            None => {
                self.target(&record_key, Operation::BeginUpload)?;
                UploadTarget::scalar(record_key)
            }
            Some(index) => {
                let target = self.target(&record_key, Operation::BeginUploadAt)?;
                let slot = self.store.slot_at(&record_key, index).ok_or_else(|| {
                    Error::InvalidInput(format!("{} has no image at position {}", target.label, index + 1))
                })?;
                UploadTarget::element(record_key, slot)
            }
        };

        let filename = file.filename.clone();
        let task_id = self
            .uploads
            .start(upload_target.clone(), file, self.store.epoch())?;
        self.emit(EditorEvent::UploadStarted {
            task_id,
            target: upload_target,
            filename,
        });
        Ok(task_id)
    }

    // ------------------------------------------------------------------
    // Upload resolution
    // ------------------------------------------------------------------

    /// Resolve uploads that have already completed, without waiting.
    pub fn process_uploads(&mut self) -> Vec<UploadResolution> {
        let resolved = self.uploads.resolve_ready(&mut self.store);
        for resolution in &resolved {
            self.report(resolution);
        }
        resolved
    }

    /// Wait for the next upload to complete and resolve it.
    pub async fn next_upload(&mut self) -> Option<UploadResolution> {
        let resolution = self.uploads.resolve_next(&mut self.store).await?;
        self.report(&resolution);
        Some(resolution)
    }

    /// Wait for every outstanding upload and resolve them all.
    pub async fn settle_uploads(&mut self) -> Vec<UploadResolution> {
        let mut resolved = self.process_uploads();
        while let Some(resolution) = self.next_upload().await {
            resolved.push(resolution);
        }
        resolved
    }

    fn report(&self, resolution: &UploadResolution) {
        let event = match resolution {
            UploadResolution::Applied { task, location } => EditorEvent::UploadSucceeded {
                task_id: task.id,
                target: task.target.clone(),
                location: location.clone(),
            },
            UploadResolution::Failed { task, message } => EditorEvent::UploadFailed {
                task_id: task.id,
                target: task.target.clone(),
                message: message.clone(),
            },
            UploadResolution::Discarded { task, reason } => EditorEvent::UploadDiscarded {
                task_id: task.id,
                target: task.target.clone(),
                reason: reason.clone(),
            },
        };
        self.emit(event);
    }

    // ------------------------------------------------------------------
    // Submit
    // ------------------------------------------------------------------

    /// Settle uploads, validate, and save the record.
    ///
    /// Validation failures leave the session `Ready`. A failed save passes
    /// through `SubmitFailed` back to `Ready` with the record untouched.
    #[instrument(
        skip(self),
        fields(subsystem = "editor", component = "session", op = "submit", document = %self.document)
    )]
    pub async fn submit(&mut self) -> Result<()> {
        self.ensure_editable()?;
        let settled = self.settle_uploads().await;
        if !settled.is_empty() {
            debug!(settled = settled.len(), "Uploads settled before submit");
        }

        let record = self.store.snapshot();
        let errors = validate(&self.schema, &record);
        if !errors.is_empty() {
            info!(errors = errors.len(), "Submit blocked by validation");
            return Err(Error::Validation(errors));
        }

        self.transition(SessionState::Submitting);
        let start = Instant::now();
        match self.adapter.save_document(&self.document, &record).await {
            Ok(()) => {
                info!(duration_ms = start.elapsed().as_millis() as u64, "Document submitted");
                self.transition(SessionState::Submitted);
                self.emit(EditorEvent::Submitted);
                Ok(())
            }
            Err(e) => {
                warn!(
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Document submit failed"
                );
                self.transition(SessionState::SubmitFailed);
                self.emit(EditorEvent::SubmitFailed {
                    message: e.user_message(),
                });
                self.transition(SessionState::Ready);
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure(&self, allowed: bool, action: &str) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "cannot {} while the session is {}",
                action, self.state
            )))
        }
    }

    fn ensure_editable(&self) -> Result<()> {
        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Submitted => Err(Error::InvalidState(
                "this document was already submitted".to_string(),
            )),
            _ => self.ensure(false, "edit"),
        }
    }

    /// Kind behind `record_key`, checked for editability and for `op`.
    fn target(&self, record_key: &str, op: Operation) -> Result<Target> {
        self.ensure_editable()?;
        let slot = self.schema.locate(record_key).ok_or_else(|| {
            Error::InvalidInput(format!("'{}' is not a field of {}", record_key, self.schema.name))
        })?;
        let kind = slot.field.kind_at(record_key).ok_or_else(|| {
            Error::InvalidInput(format!("'{}' is not a field of {}", record_key, self.schema.name))
        })?;
        if !kind.supports(op) {
            return Err(Error::InvalidInput(format!(
                "{} does not support {}",
                slot.field.label, op
            )));
        }
        Ok(Target {
            kind,
            label: slot.field.label.clone(),
            max_items: slot.field.max_items,
        })
    }

    fn len_of(&self, key: &str, kind: &FieldKind) -> usize {
        FieldValue::coerce(kind, self.store.snapshot().get(key))
            .len()
            .unwrap_or(0)
    }

    fn mutate(&mut self, key: &str, mutation: Mutation) -> Result<MutationOutcome> {
        let outcome = self.store.apply(key, mutation)?;
        if let MutationOutcome::Skipped(reason) = &outcome {
            self.emit(EditorEvent::MutationSkipped {
                key: key.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(outcome)
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if !from.can_transition_to(to) {
            warn!(%from, %to, "Unexpected session state transition");
        }
        self.state = to;
        debug!(%from, %to, "Session state changed");
        self.emit(EditorEvent::StateChanged {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    fn emit(&self, event: EditorEvent) {
        self.events.emit(event, Some(&self.document));
    }
}
