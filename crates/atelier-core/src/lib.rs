//! # atelier-core
//!
//! Core types, traits, and abstractions for the atelier structured-content
//! editor.
//!
//! This crate provides the field type registry, schema and record models,
//! the boundary traits to persistence backends, and the shared ambient
//! pieces (errors, defaults, logging field names, event bus) that the editor
//! and client crates depend on.

pub mod catalog;
pub mod defaults;
pub mod error;
pub mod events;
pub mod fields;
pub mod file_safety;
pub mod logging;
pub mod models;
pub mod projection;
pub mod schema;
pub mod traits;

// Re-export commonly used types at crate root
pub use catalog::SchemaCatalog;
pub use error::{Error, FieldError, Result};
pub use events::{EditorEvent, EventBus, EventEnvelope};
pub use fields::{
    ControlKind, FieldKind, FieldValue, MediaVariant, Operation, StructItem, StructShape,
};
pub use file_safety::{detect_content_type, validate_media_file, ValidationResult};
pub use models::*;
pub use projection::{pick_media, pick_media_list, project_dual, Device};
pub use schema::{FieldSchema, FieldSlot, PageSchema, SectionSchema};
pub use traits::*;
