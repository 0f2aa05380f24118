//! Upload Coordinator.
//!
//! Each accepted file becomes an [`UploadTask`] whose transfer runs on a
//! spawned tokio task. Completions come back over a channel and are only
//! resolved when the owning session drains them, so the write of an upload
//! result into the record happens on the session's own turn and is ordered
//! against user edits.
//!
//! A result is discarded instead of written when:
//! - a newer upload or a direct edit superseded the task's target,
//! - the document was reloaded since the task started (epoch mismatch),
//! - the target array element was removed (its slot token is gone).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use atelier_core::defaults;
use atelier_core::{
    validate_media_file, Error, MediaFile, PersistenceAdapter, Result, TaskId, UploadResponse,
    UploadStatus, UploadTarget,
};

use crate::store::{ContentStore, Mutation, MutationOutcome};

/// One file transfer and its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    pub id: TaskId,
    pub target: UploadTarget,
    pub filename: String,
    pub status: UploadStatus,
    /// Stored location once the upload succeeded.
    pub result_location: Option<String>,
    /// Store epoch the task was started in.
    pub epoch: u64,
    pub started_at: Instant,
}

/// What happened to an upload when its completion was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadResolution {
    /// The location was written to the target.
    Applied { task: UploadTask, location: String },
    /// The upload failed; the target keeps its previous value.
    Failed { task: UploadTask, message: String },
    /// The result arrived but no longer applies to the record.
    Discarded { task: UploadTask, reason: String },
}

impl UploadResolution {
    pub fn task(&self) -> &UploadTask {
        match self {
            UploadResolution::Applied { task, .. }
            | UploadResolution::Failed { task, .. }
            | UploadResolution::Discarded { task, .. } => task,
        }
    }
}

struct Completion {
    task_id: TaskId,
    result: Result<UploadResponse>,
}

/// Starts uploads and resolves their results against a [`ContentStore`].
pub struct UploadCoordinator {
    adapter: Arc<dyn PersistenceAdapter>,
    tasks: HashMap<TaskId, UploadTask>,
    superseded: HashSet<TaskId>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    max_file_bytes: u64,
    timeout: Duration,
}

impl UploadCoordinator {
    pub fn new(adapter: Arc<dyn PersistenceAdapter>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            adapter,
            tasks: HashMap::new(),
            superseded: HashSet::new(),
            tx,
            rx,
            max_file_bytes: defaults::UPLOAD_MAX_BYTES,
            timeout: Duration::from_secs(defaults::UPLOAD_TIMEOUT_SECS),
        }
    }

    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate `file` and start transferring it for `target`.
    ///
    /// Rejected files create no task. Any pending task on the same target is
    /// superseded: its result will be discarded when it arrives.
    pub fn start(&mut self, target: UploadTarget, file: MediaFile, epoch: u64) -> Result<TaskId> {
        let check = validate_media_file(&file, self.max_file_bytes);
        if !check.allowed {
            let reason = check
                .block_reason
                .unwrap_or_else(|| format!("{} cannot be uploaded", file.filename));
            warn!(
                field_key = %target.key,
                filename = %file.filename,
                file_size = file.size(),
                %reason,
                "Upload rejected"
            );
            return Err(Error::UnsafeFile(reason));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("uploads need an async runtime: {}", e)))?;

        self.supersede(&target);

        let task = UploadTask {
            id: TaskId::new(),
            target,
            filename: file.filename.clone(),
            status: UploadStatus::Pending,
            result_location: None,
            epoch,
            started_at: Instant::now(),
        };
        let task_id = task.id;

        info!(
            task_id = %task_id,
            target = %task.target,
            filename = %task.filename,
            file_size = file.size(),
            content_type = check.detected_type.as_deref().unwrap_or("unknown"),
            "Upload started"
        );
        self.tasks.insert(task_id, task);

        let adapter = Arc::clone(&self.adapter);
        let tx = self.tx.clone();
        let timeout = self.timeout;
        let transfer = runtime.spawn(async move {
            match tokio::time::timeout(timeout, adapter.upload_media(file)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Upload(format!(
                    "Upload exceeded timeout of {}s",
                    timeout.as_secs()
                ))),
            }
        });
        // Panicked or cancelled transfers still report a completion.
        runtime.spawn(async move {
            let result = match transfer.await {
                Ok(result) => result,
                Err(e) => Err(Error::Internal(format!("Upload task ended abnormally: {}", e))),
            };
            // The receiver lives as long as the coordinator.
            let _ = tx.send(Completion { task_id, result });
        });

        Ok(task_id)
    }

    /// Mark every pending task aimed at `target` as superseded.
    pub fn supersede(&mut self, target: &UploadTarget) -> usize {
        self.supersede_where(|t| t == target)
    }

    /// Mark every pending task on `key` (any element) as superseded.
    pub fn supersede_key(&mut self, key: &str) -> usize {
        self.supersede_where(|t| t.key == key)
    }

    fn supersede_where(&mut self, matches: impl Fn(&UploadTarget) -> bool) -> usize {
        let ids: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|t| matches(&t.target) && !self.superseded.contains(&t.id))
            .map(|t| t.id)
            .collect();
        for id in &ids {
            debug!(task_id = %id, "Upload superseded");
            self.superseded.insert(*id);
        }
        ids.len()
    }

    /// Tasks still in flight, superseded ones excluded.
    pub fn pending(&self) -> impl Iterator<Item = &UploadTask> {
        self.tasks
            .values()
            .filter(|t| !self.superseded.contains(&t.id))
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Whether any transfer, superseded or not, has yet to report back.
    pub fn has_outstanding(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn task(&self, id: TaskId) -> Option<&UploadTask> {
        self.tasks.get(&id)
    }

    /// Resolve every completion that has already arrived, without waiting.
    pub fn resolve_ready(&mut self, store: &mut ContentStore) -> Vec<UploadResolution> {
        let mut resolved = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            if let Some(resolution) = self.resolve(completion, store) {
                resolved.push(resolution);
            }
        }
        resolved
    }

    /// Wait for the next completion and resolve it.
    ///
    /// Returns `None` once nothing is outstanding.
    pub async fn resolve_next(&mut self, store: &mut ContentStore) -> Option<UploadResolution> {
        while self.has_outstanding() {
            let completion = self.rx.recv().await?;
            if let Some(resolution) = self.resolve(completion, store) {
                return Some(resolution);
            }
        }
        None
    }

    fn resolve(&mut self, completion: Completion, store: &mut ContentStore) -> Option<UploadResolution> {
        let Completion { task_id, result } = completion;
        let Some(mut task) = self.tasks.remove(&task_id) else {
            debug!(task_id = %task_id, "Completion for unknown upload ignored");
            return None;
        };
        let duration_ms = task.started_at.elapsed().as_millis() as u64;

        if self.superseded.remove(&task_id) {
            return Some(discard(task, "superseded by a newer edit", duration_ms));
        }
        if task.epoch != store.epoch() {
            return Some(discard(task, "document was reloaded", duration_ms));
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                task.status = UploadStatus::Failed;
                let message = failure_message(&e);
                warn!(
                    task_id = %task.id,
                    target = %task.target,
                    error = %e,
                    duration_ms,
                    "Upload failed"
                );
                return Some(UploadResolution::Failed { task, message });
            }
        };

        let Some(location) = extract_location(&response) else {
            task.status = UploadStatus::Failed;
            warn!(
                task_id = %task.id,
                target = %task.target,
                duration_ms,
                "Upload response carried no location"
            );
            return Some(UploadResolution::Failed {
                task,
                message: defaults::UPLOAD_NO_LOCATION_MESSAGE.to_string(),
            });
        };

        task.status = UploadStatus::Succeeded;
        task.result_location = Some(location.clone());

        let mutation = match task.target.slot {
            Some(slot) => Mutation::SetSlot(slot, Value::String(location.clone())),
            None => Mutation::Set(Value::String(location.clone())),
        };
        match store.apply(&task.target.key, mutation) {
            Ok(MutationOutcome::Applied(_)) => {
                info!(
                    task_id = %task.id,
                    target = %task.target,
                    duration_ms,
                    "Upload applied"
                );
                Some(UploadResolution::Applied { task, location })
            }
            Ok(MutationOutcome::Skipped(reason)) => Some(discard(task, &reason, duration_ms)),
            Err(e) => {
                warn!(task_id = %task.id, target = %task.target, error = %e, "Upload result not writable");
                Some(UploadResolution::Failed {
                    task,
                    message: e.user_message(),
                })
            }
        }
    }
}

fn discard(task: UploadTask, reason: &str, duration_ms: u64) -> UploadResolution {
    info!(
        task_id = %task.id,
        target = %task.target,
        %reason,
        duration_ms,
        "Upload result discarded"
    );
    UploadResolution::Discarded {
        task,
        reason: reason.to_string(),
    }
}

/// User-facing reason for a failed transfer: the server's own reason when it
/// gave one, otherwise a generic sentence. Client-side detail stays in the
/// logs.
fn failure_message(error: &Error) -> String {
    match error {
        Error::Rejected {
            reason: Some(reason),
            ..
        } if !reason.trim().is_empty() => reason.clone(),
        _ => defaults::UPLOAD_FAILED_MESSAGE.to_string(),
    }
}

/// Find the stored location in an upload response.
///
/// Probes [`defaults::LOCATION_FIELDS`] in order on the top-level object,
/// then on a nested `data` object. Blank strings do not count.
pub fn extract_location(response: &UploadResponse) -> Option<String> {
    let probe = |value: &Value| {
        defaults::LOCATION_FIELDS.iter().find_map(|field| {
            value
                .get(*field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    };
    let body = &response.0;
    probe(body).or_else(|| body.get("data").and_then(probe))
}
