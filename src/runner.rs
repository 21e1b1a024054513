//! Runs admitted jobs to a terminal state.

use crate::conversion::{ConversionContext, ConversionExecutor};
use crate::retention::Retention;
use crate::scheduler::JobDispatcher;
use crate::state::{ErrorKind, Job, JobStore};
use crate::storage::{remove_if_exists, StorageLayout};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Spawns one task per admitted job.
///
/// The task converts the input into the temp area, publishes the result to
/// the output directory, records it, deletes the input, and hands the job to
/// retention.
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<JobStore>,
    executor: Arc<ConversionExecutor>,
    storage: Arc<StorageLayout>,
    retention: Arc<Retention>,
}

impl JobRunner {
    pub fn new(
        store: Arc<JobStore>,
        executor: Arc<ConversionExecutor>,
        storage: Arc<StorageLayout>,
        retention: Arc<Retention>,
    ) -> Self {
        Self {
            store,
            executor,
            storage,
            retention,
        }
    }

    /// Convert a job that is already in processing and wait for the result.
    pub async fn process(&self, job: Job) {
        let id = job.id;
        let ctx = ConversionContext {
            job_id: id,
            input: self.storage.input_path(&job),
            output: self.storage.work_path(&job),
        };

        let store = self.store.clone();
        let on_progress = move |percent: f64| {
            if let Some(job) = store.update_progress(id, percent as f32) {
                debug!("Job {} progress {:.1}%", id, job.progress);
            }
        };

        let converted = match self.executor.run(&ctx, &on_progress).await {
            Ok(outcome) => match self.storage.publish_output(&job, &ctx.output).await {
                Ok(output) => Ok((outcome, output)),
                Err(e) => Err((
                    ErrorKind::Conversion,
                    format!("could not move output into place: {}", e),
                )),
            },
            Err(e) => Err((e.kind(), e.to_string())),
        };

        match converted {
            Ok((outcome, output)) => match self.store.mark_completed(id) {
                Ok(done) => {
                    let secs = done.elapsed().map(|d| d.num_seconds()).unwrap_or_default();
                    info!(
                        "Job {} completed in {}s ({} attempt(s), {})",
                        id, secs, outcome.attempts, outcome.strategy
                    );
                    self.retention.schedule_completed(&done, output);
                }
                Err(e) => error!("Could not record completion of job {}: {}", id, e),
            },
            Err((kind, message)) => {
                error!("Job {} failed: {}", id, message);
                match self.store.mark_failed(id, kind, &message) {
                    Ok(failed) => {
                        self.retention.schedule_failed(&failed);
                    }
                    Err(e) => error!("Could not record failure of job {}: {}", id, e),
                }
                remove_quietly(&ctx.output, "partial output").await;
            }
        }

        remove_quietly(&ctx.input, "input").await;
    }
}

impl JobDispatcher for JobRunner {
    fn dispatch(&self, job: Job) {
        let runner = self.clone();
        tokio::spawn(async move { runner.process(job).await });
    }
}

async fn remove_quietly(path: &Path, what: &str) {
    if let Err(e) = remove_if_exists(path).await {
        warn!("Failed to remove {} {:?}: {}", what, path, e);
    }
}
