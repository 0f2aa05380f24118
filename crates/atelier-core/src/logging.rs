//! Structured logging field name constants for atelier.
//!
//! All crates use these constants for consistent structured logging fields,
//! so editor sessions, uploads and backend calls can be correlated by the
//! same names in any log sink.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Save or load failed and the user has to act |
//! | WARN  | Recoverable issue: skipped mutation, failed upload, discarded result |
//! | INFO  | Session lifecycle (opened, submitted), backend client setup |
//! | DEBUG | Mutations applied, upload started/resolved, request timings |
//! | TRACE | Per-field enumeration and probing details |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "editor", "client", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "store", "uploads", "session", "http", "memory"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "apply", "start_upload", "submit", "get_document"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Document being edited, rendered as `type/id`.
pub const DOCUMENT: &str = "document";

/// Document type (schema name).
pub const DOC_TYPE: &str = "doc_type";

/// Record key a mutation or upload targets.
pub const FIELD_KEY: &str = "field_key";

/// Upload task identifier.
pub const TASK_ID: &str = "task_id";

/// Slot token of an array element.
pub const SLOT: &str = "slot";

/// Related-entity collection name.
pub const COLLECTION: &str = "collection";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Size of an uploaded file in bytes.
pub const FILE_SIZE: &str = "file_size";

/// Number of uploads still pending.
pub const PENDING: &str = "pending";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
