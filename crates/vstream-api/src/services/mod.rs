//! Business logic behind the handlers.

pub mod ingest;

pub use ingest::{stage_video, StagedVideo};
