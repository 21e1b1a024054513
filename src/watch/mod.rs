//! Drop-folder ingestion.
//!
//! Files with a configured extension that appear in a watched directory are
//! enqueued once they stop changing.

pub mod settle;

pub use settle::FileSettleTracker;

use crate::config::WatchConfig;
use crate::engine::Engine;
use crate::naming::output_name;
use crate::state::JobOrigin;
use anyhow::{Context, Result};
use clipforge_common::paths::{file_name_string, has_extension};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How often pending files are checked for having settled.
const SETTLE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum FileEvent {
    Changed(PathBuf),
    Removed(PathBuf),
}

/// File watcher that feeds settled drop-folder files into the engine
pub struct FileWatcher {
    config: WatchConfig,
    engine: Arc<Engine>,
    watcher: Option<RecommendedWatcher>,
    stop: CancellationToken,
}

impl FileWatcher {
    pub fn new(config: WatchConfig, engine: Arc<Engine>) -> Self {
        Self {
            config,
            engine,
            watcher: None,
            stop: CancellationToken::new(),
        }
    }

    /// Start watching configured directories
    pub fn start(&mut self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("File watcher is disabled");
            return Ok(());
        }

        if self.config.paths.is_empty() {
            tracing::warn!("No watch paths configured");
            return Ok(());
        }

        let (event_tx, event_rx) = mpsc::channel::<FileEvent>(100);
        let extensions = self.config.extensions.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for path in event.paths {
                        if !has_extension(&path, extensions.as_slice()) {
                            continue;
                        }
                        let file_event = match event.kind {
                            EventKind::Create(_) | EventKind::Modify(_) => FileEvent::Changed(path),
                            EventKind::Remove(_) => FileEvent::Removed(path),
                            _ => continue,
                        };
                        let _ = event_tx.blocking_send(file_event);
                    }
                }
                Err(e) => tracing::warn!("Watch error: {}", e),
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        for path in &self.config.paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::NonRecursive)
                    .with_context(|| format!("Failed to watch path: {:?}", path))?;
                tracing::info!("Watching directory: {:?}", path);
            } else {
                tracing::warn!("Watch path does not exist: {:?}", path);
            }
        }

        self.watcher = Some(watcher);

        let settle = FileSettleTracker::new(Duration::from_secs(self.config.settle_time_secs));
        tokio::spawn(run_events(
            event_rx,
            settle,
            self.engine.clone(),
            self.config.clone(),
            self.stop.clone(),
        ));

        Ok(())
    }

    /// Stop watching
    pub fn stop(&mut self) {
        self.stop.cancel();
        self.watcher = None;
        tracing::info!("File watcher stopped");
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn run_events(
    mut event_rx: mpsc::Receiver<FileEvent>,
    mut settle: FileSettleTracker,
    engine: Arc<Engine>,
    config: WatchConfig,
    stop: CancellationToken,
) {
    let mut check_interval = tokio::time::interval(SETTLE_CHECK_INTERVAL);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,

            event = event_rx.recv() => match event {
                Some(FileEvent::Changed(path)) => {
                    tracing::debug!("File event: {:?}", path);
                    settle.file_changed(path, Instant::now());
                }
                Some(FileEvent::Removed(path)) => {
                    settle.remove(&path);
                }
                None => break,
            },

            _ = check_interval.tick() => {
                for path in settle.take_settled(Instant::now()) {
                    if path.is_file() {
                        enqueue_settled(&engine, &config, &path).await;
                    }
                }
            }
        }
    }
}

async fn enqueue_settled(engine: &Engine, config: &WatchConfig, path: &Path) {
    let Some(file_name) = file_name_string(path) else {
        return;
    };
    let watch_path = path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let name = output_name(&file_name, config.rename, None);
    match engine
        .enqueue(path, &name, JobOrigin::Watcher { watch_path })
        .await
    {
        Ok(id) => tracing::info!("Queued watcher job {} for: {:?}", id, path),
        Err(e) => tracing::warn!("Failed to queue watcher job for {:?}: {}", path, e),
    }
}
