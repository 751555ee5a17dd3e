//! Job record persistence.
//!
//! This crate provides:
//! - The [`JobStore`] capability shared by the worker and the status endpoint
//! - A Firestore REST client with token caching, retry and metrics
//! - A Firestore-backed job store and an in-memory one

pub mod client;
pub mod error;
pub mod job_repo;
pub mod job_store;
pub mod memory;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;


pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use job_repo::FirestoreJobStore;
pub use job_store::{JobStore, JobStoreError, JobStoreResult};
pub use memory::MemoryJobStore;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
