//! Error types for the atelier content editor.

use serde::Serialize;
use thiserror::Error;

use crate::defaults;

/// Result type alias using atelier's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A single field that failed submit-time validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Record key of the offending field.
    pub key: String,
    /// Human-readable field label.
    pub label: String,
    /// Short reason, suitable for display next to the control.
    pub message: String,
}

impl FieldError {
    pub fn new(key: impl Into<String>, label: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            message: message.into(),
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} ({})", e.key, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Core error type for atelier operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// No schema registered for a document type
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    /// Schema definition is structurally invalid
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Required fields missing or limits exceeded at submit time
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// File refused by the media safety checks
    #[error("Unsafe file: {0}")]
    UnsafeFile(String),

    /// Upload completed but the response was unusable
    #[error("Upload error: {0}")]
    Upload(String),

    /// Server answered with a non-success status
    #[error("Rejected by server ({status}): {}", .reason.as_deref().unwrap_or("no reason given"))]
    Rejected { status: u16, reason: Option<String> },

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short, human-readable reason for display in the admin panel.
    ///
    /// Server-provided reasons are passed through untouched; transport
    /// failures collapse to a generic sentence.
    pub fn user_message(&self) -> String {
        match self {
            Error::Rejected {
                reason: Some(reason),
                ..
            } if !reason.trim().is_empty() => reason.clone(),
            Error::Rejected { status, .. } => {
                format!("The server rejected the request (status {}).", status)
            }
            Error::Validation(errors) => {
                let labels: Vec<&str> = errors.iter().map(|e| e.label.as_str()).collect();
                format!("Please check these fields: {}", labels.join(", "))
            }
            Error::Request(_) => defaults::NETWORK_FAILED_MESSAGE.to_string(),
            Error::InvalidInput(msg)
            | Error::InvalidState(msg)
            | Error::UnsafeFile(msg)
            | Error::Upload(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
