//! # atelier-client
//!
//! Persistence backends for the atelier editor:
//!
//! - [`http::HttpBackend`]: JSON REST API with multipart uploads
//! - [`memory::MemoryBackend`]: in-process store for tests and offline use
//!
//! The `atelier` binary in this crate drives an editing session from the
//! command line.

pub mod http;
pub mod memory;

pub use http::{ClientConfig, HttpBackend};
pub use memory::{BackendCall, MemoryBackend, UploadReply};
