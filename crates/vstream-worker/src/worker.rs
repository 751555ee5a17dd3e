//! Single-flight transcode worker.
//!
//! `enqueue` records the job and returns at once. A drain task pops staged
//! paths in FIFO order and runs them one at a time: encode, upload every
//! output file, remove the local tree, mark the record terminal. A failing
//! job never stops the drain.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio::sync::Notify;
use tracing::{error, info, warn, Instrument};

use vstream_firestore::JobStore;
use vstream_media::fs_utils::{list_files_recursive, remove_dir_all_if_exists};
use vstream_media::{MediaError, Transcoder};
use vstream_models::{JobName, JobStatus};
use vstream_storage::{content_type_for, ObjectStore};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::flight::SingleFlight;
use crate::logging::JobLogger;
use crate::metrics;
use crate::queue::PendingQueue;

struct WorkerInner {
    config: WorkerConfig,
    queue: PendingQueue,
    flight: SingleFlight,
    idle: Notify,
    store: Arc<dyn JobStore>,
    transcoder: Arc<dyn Transcoder>,
    objects: Arc<dyn ObjectStore>,
}

/// Handle to the transcode worker. Cheap to clone.
#[derive(Clone)]
pub struct TranscodeWorker {
    inner: Arc<WorkerInner>,
}

impl TranscodeWorker {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn JobStore>,
        transcoder: Arc<dyn Transcoder>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                config,
                queue: PendingQueue::new(),
                flight: SingleFlight::new(),
                idle: Notify::new(),
                store,
                transcoder,
                objects,
            }),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    /// Create the staging root if it does not exist.
    pub async fn prepare_staging(&self) -> WorkerResult<()> {
        tokio::fs::create_dir_all(&self.inner.config.staging_dir).await?;
        Ok(())
    }

    /// Register a staged file and queue it for transcoding.
    ///
    /// The record is created `Pending` before the path is queued, so a
    /// status poll never misses a queued job. Returns without waiting for
    /// any encode.
    pub async fn enqueue(&self, staged: impl Into<PathBuf>) -> WorkerResult<JobName> {
        let staged = staged.into();
        let name = JobName::from_staged_path(&staged).ok_or_else(|| {
            WorkerError::invalid_path(format!("{} has no file name", staged.display()))
        })?;

        self.inner.store.create(&name).await?;

        let pending = self.inner.queue.push(staged).await;
        metrics::record_job_enqueued();
        metrics::set_pending(pending);
        info!(job_name = %name, pending, "Queued transcode job");

        if !self.inner.flight.is_running() {
            tokio::spawn(self.clone().drain());
        }

        Ok(name)
    }

    /// Paths queued but not yet started.
    pub async fn pending_len(&self) -> usize {
        self.inner.queue.len().await
    }

    /// Whether a job is being processed right now.
    pub fn is_running(&self) -> bool {
        self.inner.flight.is_running()
    }

    /// Resolve once nothing is running and the queue is empty.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.inner.flight.is_running() && self.inner.queue.is_empty().await {
                return;
            }
            notified.await;
        }
    }

    async fn drain(self) {
        loop {
            let Some(guard) = self.inner.flight.try_acquire() else {
                return;
            };

            while let Some(path) = self.inner.queue.pop().await {
                metrics::set_pending(self.inner.queue.len().await);
                self.run_job(path).await;
            }
            drop(guard);

            // A push that saw the flight held right before release is ours to pick up.
            if self.inner.queue.is_empty().await {
                self.inner.idle.notify_waiters();
                return;
            }
        }
    }

    async fn run_job(&self, path: PathBuf) {
        let Some(name) = JobName::from_staged_path(&path) else {
            warn!(path = %path.display(), "Dropping queued path without a file name");
            return;
        };

        let outcome = AssertUnwindSafe(self.process(&name, &path))
            .catch_unwind()
            .await;

        if let Err(panic) = outcome {
            let err = WorkerError::Panicked(panic_message(panic.as_ref()));
            error!(job_name = %name, error = %err, "Transcode job panicked");
            metrics::record_job_failed(err.stage());
            self.update_status(&name, JobStatus::Failed, Some(err.to_string()))
                .await;
        }
    }

    async fn process(&self, name: &JobName, input: &Path) {
        let logger = JobLogger::new(name, "hls_transcode");
        let span = logger.create_span();

        async {
            logger.log_start(&input.display().to_string());
            self.update_status(name, JobStatus::Processing, None).await;

            match self.transcode_and_publish(name, input, &logger).await {
                Ok(uploaded) => {
                    self.update_status(name, JobStatus::Success, None).await;
                    metrics::record_job_completed();
                    logger.log_completion(&format!("uploaded {uploaded} files"));
                }
                Err(e) => {
                    logger.log_error(&e.to_string());
                    metrics::record_job_failed(e.stage());
                    self.update_status(name, JobStatus::Failed, Some(e.to_string()))
                        .await;
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Encode, upload and clean up. The staged input survives any failure.
    async fn transcode_and_publish(
        &self,
        name: &JobName,
        input: &Path,
        logger: &JobLogger,
    ) -> WorkerResult<usize> {
        let started = Instant::now();
        let output_dir = self.inner.transcoder.encode(input).await?;
        metrics::record_encode_duration(started.elapsed());

        let staging = &self.inner.config.staging_dir;
        if staging.starts_with(&output_dir) {
            return Err(WorkerError::invalid_path(format!(
                "encode output {} contains the staging root",
                output_dir.display()
            )));
        }
        // Everything under the output dir is published and then deleted.
        if output_dir.file_name().and_then(|n| n.to_str()) != Some(name.as_str()) {
            return Err(WorkerError::invalid_path(format!(
                "encode output {} is not the directory of job {name}",
                output_dir.display()
            )));
        }

        let files: Vec<PathBuf> = list_files_recursive(&output_dir)
            .await
            .map_err(|e| WorkerError::listing_failed(e.to_string()))?
            .into_iter()
            .filter(|f| f != input)
            .collect();
        if files.is_empty() {
            return Err(WorkerError::listing_failed("encode produced no files"));
        }
        logger.log_progress(&format!("uploading {} files", files.len()));

        let started = Instant::now();
        for file in &files {
            let key = object_key(&self.inner.config.remote_prefix, name, &output_dir, file)?;
            self.inner
                .objects
                .upload(file, &key, content_type_for(file))
                .await?;
        }
        metrics::record_upload_duration(started.elapsed());

        remove_dir_all_if_exists(&output_dir)
            .await
            .map_err(|e| match e {
                MediaError::Io(io) => WorkerError::Io(io),
                other => WorkerError::Media(other),
            })?;

        if let Ok(true) = tokio::fs::try_exists(input).await {
            if let Err(e) = tokio::fs::remove_file(input).await {
                logger.log_warning(&format!("failed to remove staged input: {e}"));
            }
        }

        Ok(files.len())
    }

    /// Status writes are best-effort; a store outage must not stop the queue.
    async fn update_status(&self, name: &JobName, status: JobStatus, message: Option<String>) {
        if let Err(e) = self.inner.store.set_status(name, status, message).await {
            warn!(job_name = %name, status = %status, error = %e, "Failed to update job status");
            metrics::record_status_update_failure(status.as_str());
        }
    }
}

/// Remote key for `file`: `<prefix>/<job>/<path relative to root>`.
fn object_key(prefix: &str, name: &JobName, root: &Path, file: &Path) -> WorkerResult<String> {
    let relative = file.strip_prefix(root).map_err(|_| {
        WorkerError::invalid_path(format!(
            "{} is outside {}",
            file.display(),
            root.display()
        ))
    })?;

    let mut parts: Vec<String> = Vec::new();
    if !prefix.is_empty() {
        parts.push(prefix.to_string());
    }
    parts.push(name.to_string());

    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => {
                return Err(WorkerError::invalid_path(format!(
                    "unexpected component in {}",
                    relative.display()
                )))
            }
        }
    }

    Ok(parts.join("/"))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
