//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which owns a temporary storage root and a config
//! tuned for fast polling, plus scriptable stand-ins for the encoder and the
//! CPU gauge.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use clipforge::config::Config;
use clipforge::conversion::{
    ConversionContext, ConversionExecutor, ConversionStrategy, ProgressFn,
};
use clipforge::cpu::LoadGauge;
use clipforge::engine::Engine;
use clipforge::events::{JobEvent, Subscription};

/// Temporary storage root plus a config pointing into it.
pub struct TestHarness {
    pub dir: TempDir,
    pub config: Config,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = test_config(dir.path());
        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a source file outside the upload area.
    pub fn write_input(&self, name: &str, contents: &[u8]) -> PathBuf {
        let sources = self.root().join("sources");
        std::fs::create_dir_all(&sources).expect("failed to create sources dir");
        let path = sources.join(name);
        std::fs::write(&path, contents).expect("failed to write input");
        path
    }

    /// Engine running `strategy` as its only conversion attempt.
    pub fn engine_with(&self, strategy: impl ConversionStrategy + 'static) -> Engine {
        let executor = ConversionExecutor::new(vec![Arc::new(strategy)], Duration::from_secs(30));
        Engine::with_executor(&self.config, executor)
    }
}

/// Config rooted at `root` with millisecond scheduler intervals.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.upload_dir = root.join("uploads");
    config.storage.output_dir = root.join("outputs");
    config.storage.temp_dir = root.join("temp");
    config.engine.poll_interval_ms = 10;
    config.engine.throttled_interval_ms = 20;
    config.conversion.primary.niceness = None;
    config
}

/// Load gauge whose reading the test can change while the engine runs.
#[derive(Clone)]
pub struct SharedLoad(Arc<Mutex<f64>>);

impl SharedLoad {
    pub fn new(utilization: f64) -> Self {
        Self(Arc::new(Mutex::new(utilization)))
    }

    pub fn set(&self, utilization: f64) {
        *self.0.lock() = utilization;
    }
}

impl LoadGauge for SharedLoad {
    fn utilization(&mut self) -> f64 {
        *self.0.lock()
    }
}

/// Strategy that reports 50% progress, then blocks until released.
///
/// Inputs whose name contains `broken` fail instead of producing output.
#[derive(Clone)]
pub struct GatedStrategy {
    release: Arc<Semaphore>,
    started: Arc<AtomicUsize>,
}

impl GatedStrategy {
    pub fn new() -> Self {
        Self {
            release: Arc::new(Semaphore::new(0)),
            started: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A strategy that never blocks.
    pub fn open() -> Self {
        let strategy = Self::new();
        strategy.release(1_000_000);
        strategy
    }

    /// Let `n` blocked conversions finish.
    pub fn release(&self, n: usize) {
        self.release.add_permits(n);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversionStrategy for GatedStrategy {
    fn name(&self) -> &str {
        "gated"
    }

    async fn convert(
        &self,
        ctx: &ConversionContext,
        on_progress: &ProgressFn,
        cancel: &CancellationToken,
    ) -> clipforge_av::Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        on_progress(50.0);

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(clipforge_av::Error::Cancelled { tool: "gated".to_string() });
            }
            permit = self.release.acquire() => {
                if let Ok(permit) = permit {
                    permit.forget();
                }
            }
        }

        if ctx.input.to_string_lossy().contains("broken") {
            return Err(clipforge_av::Error::parse_error("gated", "broken input"));
        }
        tokio::fs::write(&ctx.output, b"mp4").await?;
        Ok(())
    }
}

/// Poll `condition` every 10ms until it holds, panicking after `timeout`.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let result = tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not met within {:?}", timeout);
}

/// Receive events until one matches `predicate`, returning everything seen.
pub async fn collect_until(
    subscription: &mut Subscription,
    timeout: Duration,
    mut predicate: impl FnMut(&JobEvent) -> bool,
) -> Vec<JobEvent> {
    let mut seen = Vec::new();
    let result = tokio::time::timeout(timeout, async {
        while let Some(event) = subscription.recv().await {
            let done = predicate(&event);
            seen.push(event);
            if done {
                return;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "expected event not received; saw {:?}", seen);
    seen
}

/// Write an executable shell script standing in for ffmpeg or ffprobe.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write fake tool");
    let mut perms = std::fs::metadata(&path)
        .expect("failed to stat fake tool")
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("failed to chmod fake tool");
    path
}
