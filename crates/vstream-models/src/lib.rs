//! Shared data models for the VStream HLS pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Transcode job records and their status state machine
//! - Media descriptors returned to uploading clients

pub mod job;
pub mod job_status;
pub mod media;

// Re-export common types
pub use job::{JobName, JobRecord};
pub use job_status::JobStatus;
pub use media::{Media, MediaType};
