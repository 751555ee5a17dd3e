//! Object storage for HLS artifacts.
//!
//! This crate provides:
//! - The [`ObjectStore`] capability used by the worker and the artifact proxy
//! - A Cloudflare R2 client (S3 API)
//! - A local filesystem store for development and tests
//! - Content-type derivation from file extensions

pub mod client;
pub mod content_type;
pub mod error;
pub mod local;
pub mod store;

pub use client::{R2Client, R2Config};
pub use content_type::content_type_for;
pub use error::{StorageError, StorageResult};
pub use local::FsObjectStore;
pub use store::{ObjectStore, StoredObject};
