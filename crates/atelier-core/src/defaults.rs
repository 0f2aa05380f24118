//! Centralized default constants for atelier.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers or message strings.

// =============================================================================
// BACKEND
// =============================================================================

/// Default REST backend base URL.
pub const API_URL: &str = "http://127.0.0.1:8080/api";

/// Timeout for document and collection requests in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for media uploads in seconds.
pub const UPLOAD_TIMEOUT_SECS: u64 = 120;

/// Environment variable: backend base URL.
pub const ENV_API_URL: &str = "ATELIER_API_URL";

/// Environment variable: bearer token sent with every request.
pub const ENV_API_TOKEN: &str = "ATELIER_API_TOKEN";

/// Environment variable: request timeout override in seconds.
pub const ENV_TIMEOUT_SECS: &str = "ATELIER_TIMEOUT_SECS";

/// Environment variable: maximum upload size override in bytes.
pub const ENV_UPLOAD_MAX_BYTES: &str = "ATELIER_UPLOAD_MAX_BYTES";

// =============================================================================
// UPLOADS
// =============================================================================

/// Maximum accepted media file size (25 MB).
pub const UPLOAD_MAX_BYTES: u64 = 25 * 1024 * 1024;

/// Response fields probed for the stored file location, in priority order.
///
/// Backends disagree on naming; the first non-empty string wins. The same
/// order is applied inside a nested `data` object when the top level has
/// none of them.
pub const LOCATION_FIELDS: &[&str] = &["url", "location", "secure_url", "file_url", "path"];

// =============================================================================
// EVENTS
// =============================================================================

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// USER-VISIBLE MESSAGES
// =============================================================================

/// Shown when an upload fails without a server-provided reason.
pub const UPLOAD_FAILED_MESSAGE: &str = "Upload failed. Please try again.";

/// Shown when an upload succeeds but no location could be found.
pub const UPLOAD_NO_LOCATION_MESSAGE: &str = "Upload finished but the server did not return a file location.";

/// Shown when a save fails without a server-provided reason.
pub const SAVE_FAILED_MESSAGE: &str = "Saving failed. Your changes are still here; please try again.";

/// Shown for transport-level failures.
pub const NETWORK_FAILED_MESSAGE: &str = "Could not reach the server. Please try again.";
