//! Timed purge of finished jobs.
//!
//! Each finished job gets a one-shot timer. When it fires, the job's output
//! file is deleted (best effort, never retried) and the record is removed
//! from the store.

use crate::state::{Job, JobStatus, JobStore};
use crate::storage::remove_if_exists;
use clipforge_common::JobId;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default time a completed output stays available.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

pub struct Retention {
    store: Arc<JobStore>,
    window: Duration,
    failed_window: Option<Duration>,
    shutdown: CancellationToken,
}

impl Retention {
    pub fn new(store: Arc<JobStore>, window: Duration, failed_window: Option<Duration>) -> Self {
        Self {
            store,
            window,
            failed_window,
            shutdown: CancellationToken::new(),
        }
    }

    /// Schedule removal of a completed job and its output file.
    pub fn schedule_completed(&self, job: &Job, output: PathBuf) -> JoinHandle<()> {
        self.spawn_purge(job.id, JobStatus::Completed, Some(output), self.window)
    }

    /// Schedule removal of a failed job's record, if failed jobs expire.
    pub fn schedule_failed(&self, job: &Job) -> Option<JoinHandle<()>> {
        let window = self.failed_window?;
        Some(self.spawn_purge(job.id, JobStatus::Failed, None, window))
    }

    /// Cancel all pending purges. Records and files stay where they are.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn spawn_purge(
        &self,
        id: JobId,
        status: JobStatus,
        artifact: Option<PathBuf>,
        delay: Duration,
    ) -> JoinHandle<()> {
        let store = self.store.clone();
        let shutdown = self.shutdown.clone();
        debug!("Job {} will be purged in {:?}", id, delay);

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            if let Some(path) = artifact {
                match remove_if_exists(&path).await {
                    Ok(true) => debug!("Removed expired output {:?}", path),
                    Ok(false) => debug!("Expired output {:?} already gone", path),
                    Err(e) => warn!("Failed to remove expired output {:?}: {}", path, e),
                }
            }

            if store.purge(id, status).is_some() {
                info!("Purged {} job {}", status, id);
            }
        })
    }
}

impl Drop for Retention {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
