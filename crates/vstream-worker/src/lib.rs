//! HLS transcode queue worker.
//!
//! Staged uploads are queued in memory and processed one at a time in
//! enqueue order. Each job is encoded, its output tree is uploaded under the
//! remote prefix, and its record moves to a terminal status.
//!
//! The pending queue is not persisted: paths queued but not yet started are
//! lost on restart, while their records stay `Pending`.

pub mod config;
pub mod error;
pub mod flight;
pub mod logging;
pub mod metrics;
pub mod queue;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use worker::TranscodeWorker;
