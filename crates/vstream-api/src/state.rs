//! Application state.

use std::sync::Arc;

use tracing::{info, warn};

use vstream_firestore::{FirestoreClient, FirestoreJobStore, JobStore, MemoryJobStore};
use vstream_media::{check_ffmpeg, check_ffprobe, FfmpegHlsTranscoder, HlsConfig};
use vstream_storage::{FsObjectStore, ObjectStore, R2Client};
use vstream_worker::{TranscodeWorker, WorkerConfig};

use crate::config::{ApiConfig, JobStoreBackend, StorageBackend};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub jobs: Arc<dyn JobStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub worker: TranscodeWorker,
}

impl AppState {
    /// Assemble state from already-built parts.
    pub fn from_parts(
        config: ApiConfig,
        jobs: Arc<dyn JobStore>,
        objects: Arc<dyn ObjectStore>,
        worker: TranscodeWorker,
    ) -> Self {
        Self {
            config,
            jobs,
            objects,
            worker,
        }
    }

    /// Build backends and the worker from the environment.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let jobs: Arc<dyn JobStore> = match config.job_store_backend {
            JobStoreBackend::Firestore => {
                let store = FirestoreJobStore::from_env(FirestoreClient::from_env()?);
                info!("Job store: firestore (collection {})", store.collection());
                Arc::new(store)
            }
            JobStoreBackend::Memory => {
                warn!("Job store: memory (records are lost on restart)");
                Arc::new(MemoryJobStore::new())
            }
        };

        let objects: Arc<dyn ObjectStore> = match config.storage_backend {
            StorageBackend::R2 => {
                let client = R2Client::from_env()?;
                info!("Object store: r2 (bucket {})", client.bucket());
                Arc::new(client)
            }
            StorageBackend::Local => {
                info!(
                    "Object store: local ({})",
                    config.local_storage_root.display()
                );
                Arc::new(FsObjectStore::new(config.local_storage_root.clone()))
            }
        };

        for check in [check_ffmpeg(), check_ffprobe()] {
            if let Err(e) = check {
                warn!("{e}; every transcode job will fail until it is installed");
            }
        }

        let worker_config = WorkerConfig::from_env();
        let transcoder = FfmpegHlsTranscoder::new(HlsConfig::from_env())
            .with_timeout(worker_config.encode_timeout.map(|t| t.as_secs()));
        let worker = TranscodeWorker::new(
            worker_config,
            Arc::clone(&jobs),
            Arc::new(transcoder),
            Arc::clone(&objects),
        );
        worker.prepare_staging().await?;

        Ok(Self::from_parts(config, jobs, objects, worker))
    }
}
