//! # atelier-editor
//!
//! Editing sessions over schema-described content records.
//!
//! - [`store`]: immutable-snapshot record store with slot identities
//! - [`uploads`]: background media uploads resolved against the store
//! - [`form`]: typed values and renderable field views
//! - [`session`]: the form engine tying schema, store and uploads together
//! - [`validation`]: pre-submit checks

pub mod form;
pub mod session;
pub mod store;
pub mod uploads;
pub mod validation;

pub use form::{field_views, resolve_value, FieldView, ViewValue};
pub use session::{EditSession, LoadOutcome, MediaAddress, SessionConfig, SessionState};
pub use store::{ContentStore, Mutation, MutationOutcome};
pub use uploads::{extract_location, UploadCoordinator, UploadResolution, UploadTask};
pub use validation::validate;
