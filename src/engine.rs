//! Composition root for the job engine.
//!
//! [`Engine`] wires the store, event bus, scheduler, runner and retention
//! together and is the only surface front ends (upload handlers, chat bots,
//! the drop-folder watcher, the CLI) need.

use crate::config::Config;
use crate::conversion::ConversionExecutor;
use crate::cpu::{CpuSampler, LoadGauge};
use crate::events::{EventBus, SubscriberId, Subscription};
use crate::naming::sanitize_filename;
use crate::retention::Retention;
use crate::runner::JobRunner;
use crate::scheduler::{Scheduler, SchedulerSettings, Sleeper};
use crate::state::{Job, JobOrigin, JobStore, QueueCounts};
use crate::storage::{StagingMode, StorageLayout};
use clipforge_common::{Error, JobId, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Engine {
    store: Arc<JobStore>,
    storage: Arc<StorageLayout>,
    runner: Arc<JobRunner>,
    retention: Arc<Retention>,
    settings: SchedulerSettings,
    staging: StagingMode,
    shutdown: CancellationToken,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Build an engine that converts with ffmpeg as configured.
    pub fn new(config: &Config) -> Self {
        let executor = ConversionExecutor::from_profiles(
            &config.conversion.primary,
            &config.conversion.fallback,
            &config.tools,
            config.conversion.deadline(),
        );
        Self::with_executor(config, executor)
    }

    pub fn with_executor(config: &Config, executor: ConversionExecutor) -> Self {
        let events = Arc::new(EventBus::new(config.engine.event_buffer));
        let store = Arc::new(JobStore::new(events));
        let storage = Arc::new(StorageLayout::from_config(&config.storage));
        let retention = Arc::new(Retention::new(
            store.clone(),
            config.conversion.retention(),
            config.conversion.failed_retention(),
        ));
        let runner = Arc::new(JobRunner::new(
            store.clone(),
            Arc::new(executor),
            storage.clone(),
            retention.clone(),
        ));

        Self {
            store,
            storage,
            runner,
            retention,
            settings: SchedulerSettings::from(&config.engine),
            staging: config.storage.staging,
            shutdown: CancellationToken::new(),
            scheduler: Mutex::new(None),
        }
    }

    /// Use a different staging mode for inputs enqueued from now on.
    pub fn with_staging(mut self, staging: StagingMode) -> Self {
        self.staging = staging;
        self
    }

    /// Create the storage directories and start admitting jobs, gated on
    /// `/proc/stat` utilization.
    pub async fn start(&self) -> Result<()> {
        self.start_with(Box::new(CpuSampler::from_proc()), None).await
    }

    /// Start with a custom load source and, optionally, a custom sleeper.
    ///
    /// Calling this on a running engine does nothing.
    pub async fn start_with(
        &self,
        gauge: Box<dyn LoadGauge>,
        sleeper: Option<Arc<dyn Sleeper>>,
    ) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ShutDown);
        }
        self.storage.ensure_dirs().await?;

        let mut slot = self.scheduler.lock();
        if slot.is_some() {
            return Ok(());
        }

        let mut scheduler = Scheduler::new(
            self.store.clone(),
            self.runner.clone(),
            gauge,
            self.settings.clone(),
        );
        if let Some(sleeper) = sleeper {
            scheduler = scheduler.with_sleeper(sleeper);
        }
        *slot = Some(tokio::spawn(scheduler.run(self.shutdown.clone())));
        Ok(())
    }

    /// Stage `input` into the upload area and queue it for conversion.
    pub async fn enqueue(
        &self,
        input: &Path,
        output_name: &str,
        origin: JobOrigin,
    ) -> Result<JobId> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ShutDown);
        }

        let file_name = input
            .file_name()
            .map(|name| sanitize_filename(&name.to_string_lossy()))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::invalid_input(format!("{:?} has no file name", input)))?;
        let output_name = sanitize_filename(output_name.trim());
        if output_name.is_empty() {
            return Err(Error::invalid_input("output name cannot be empty"));
        }

        self.storage.ensure_dirs().await?;
        let id = JobId::new();
        let size = self
            .storage
            .stage_input(id, &file_name, input, self.staging)
            .await?;

        let job = Job::with_id(id, file_name, size, output_name, origin);
        let position = self.store.enqueue(job)?;
        info!("Queued job {} at position {}", id, position);
        Ok(id)
    }

    pub fn subscribe(&self) -> Subscription {
        self.store.events().subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.store.events().unsubscribe(id)
    }

    pub fn get_job(&self, id: JobId) -> Result<Job> {
        self.store
            .get(id)
            .ok_or_else(|| Error::not_found(id.to_string()))
    }

    pub fn list_jobs(&self) -> Vec<Job> {
        self.store.list()
    }

    pub fn counts(&self) -> QueueCounts {
        self.store.counts()
    }

    /// Where the converted file of `job` is (or will be) written.
    pub fn output_path(&self, job: &Job) -> PathBuf {
        self.storage.output_path(job)
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn storage(&self) -> &StorageLayout {
        &self.storage
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.lock().is_some() && !self.shutdown.is_cancelled()
    }

    /// Stop admitting jobs and cancel pending purges.
    ///
    /// Conversions already running are left to finish on their own tasks.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.retention.shutdown();

        let handle = self.scheduler.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Scheduler task failed: {}", e);
            }
        }
        info!("Engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    fn config(root: &Path) -> Config {
        let mut config = Config::default();
        config.storage.upload_dir = root.join("up");
        config.storage.output_dir = root.join("out");
        config.storage.temp_dir = root.join("tmp");
        config
    }

    #[tokio::test]
    async fn test_enqueue_stages_and_queues() {
        let dir = tempdir().unwrap();
        let engine = Engine::new(&config(dir.path()));
        let source = dir.path().join("clip.webm");
        std::fs::write(&source, b"0123456789").unwrap();

        let id = engine
            .enqueue(&source, "clip.mp4", JobOrigin::Upload)
            .await
            .unwrap();
        let job = engine.get_job(id).unwrap();
        assert_eq!(job.file_name, "clip.webm");
        assert_eq!(job.file_size, 10);
        assert_eq!(job.queue_position, Some(1));
        assert!(engine.storage().input_path(&job).exists());
        assert!(!source.exists());
        assert_eq!(engine.counts().queued, 1);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_empty_output_name() {
        let dir = tempdir().unwrap();
        let engine = Engine::new(&config(dir.path()));
        let source = dir.path().join("clip.webm");
        std::fs::write(&source, b"x").unwrap();

        assert_matches!(
            engine.enqueue(&source, "  ", JobOrigin::Cli).await,
            Err(Error::InvalidInput(_))
        );
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_get_unknown_job() {
        let dir = tempdir().unwrap();
        let engine = Engine::new(&config(dir.path()));
        assert_matches!(engine.get_job(JobId::new()), Err(Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_work() {
        let dir = tempdir().unwrap();
        let engine = Engine::new(&config(dir.path()));
        engine.start().await.unwrap();
        assert!(engine.is_running());

        engine.shutdown().await;
        assert!(!engine.is_running());
        assert_matches!(
            engine
                .enqueue(&dir.path().join("x.webm"), "x.mp4", JobOrigin::Cli)
                .await,
            Err(Error::ShutDown)
        );
        assert_matches!(engine.start().await, Err(Error::ShutDown));
    }
}
