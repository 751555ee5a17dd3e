//! In-memory FIFO of staged paths awaiting processing.

use std::collections::VecDeque;
use std::path::PathBuf;

use tokio::sync::Mutex;

/// Pending-path queue. Not persisted.
#[derive(Debug, Default)]
pub struct PendingQueue {
    paths: Mutex<VecDeque<PathBuf>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail and return the new length.
    pub async fn push(&self, path: PathBuf) -> usize {
        let mut paths = self.paths.lock().await;
        paths.push_back(path);
        paths.len()
    }

    /// Take the oldest path.
    pub async fn pop(&self) -> Option<PathBuf> {
        self.paths.lock().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.paths.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.paths.lock().await.is_empty()
    }
}
