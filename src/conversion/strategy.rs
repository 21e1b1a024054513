//! Conversion attempts.

use super::profile::{FallbackProfile, PrimaryProfile};
use async_trait::async_trait;
use clipforge_av::{probe_duration, progress_percent, EncoderCommand, ProgressEvent};
use clipforge_common::JobId;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Progress callback; receives percentages in 0..=100.
pub type ProgressFn = dyn Fn(f64) + Send + Sync;

/// Paths for one job's conversion.
#[derive(Debug, Clone)]
pub struct ConversionContext {
    pub job_id: JobId,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// One way of producing the output file.
///
/// Implementations must stop their encoder and wait for it to exit when
/// `cancel` fires, returning a cancelled error.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn convert(
        &self,
        ctx: &ConversionContext,
        on_progress: &ProgressFn,
        cancel: &CancellationToken,
    ) -> clipforge_av::Result<()>;
}

/// Fast encode with live progress.
///
/// Probes the input duration first; if that fails the encode still runs,
/// just without progress updates.
#[derive(Debug, Clone)]
pub struct PrimaryStrategy {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    profile: PrimaryProfile,
}

impl PrimaryStrategy {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>, profile: PrimaryProfile) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            profile,
        }
    }

    async fn duration(&self, ctx: &ConversionContext, cancel: &CancellationToken) -> clipforge_av::Result<f64> {
        let probe = probe_duration(&self.ffprobe, &ctx.input);
        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(clipforge_av::Error::Cancelled {
                tool: "ffprobe".to_string(),
            }),
            result = probe => Ok(match result {
                Ok(duration) => duration,
                Err(e) => {
                    warn!("Could not get duration for job {}: {}", ctx.job_id, e);
                    0.0
                }
            }),
        }
    }
}

#[async_trait]
impl ConversionStrategy for PrimaryStrategy {
    fn name(&self) -> &str {
        "primary"
    }

    async fn convert(
        &self,
        ctx: &ConversionContext,
        on_progress: &ProgressFn,
        cancel: &CancellationToken,
    ) -> clipforge_av::Result<()> {
        let duration = self.duration(ctx, cancel).await?;
        debug!("Job {} input duration: {:.2}s", ctx.job_id, duration);

        let mut encoder = EncoderCommand::new(&self.ffmpeg)
            .args(self.profile.args(&ctx.input, &ctx.output))
            .niceness(self.profile.nice_level())
            .spawn_with_progress()?;

        if let Some(mut progress) = encoder.take_progress() {
            loop {
                let event = tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,
                    event = progress.next_event() => event,
                };
                match event {
                    Some(ProgressEvent::Elapsed(elapsed)) => {
                        if let Some(percent) = progress_percent(elapsed, duration) {
                            on_progress(percent);
                        }
                    }
                    Some(ProgressEvent::End) => on_progress(100.0),
                    None => break,
                }
            }
        }

        encoder.wait(cancel).await
    }
}

/// Slower, more compatible re-encode without progress reporting.
#[derive(Debug, Clone)]
pub struct FallbackStrategy {
    ffmpeg: PathBuf,
    profile: FallbackProfile,
}

impl FallbackStrategy {
    pub fn new(ffmpeg: impl Into<PathBuf>, profile: FallbackProfile) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            profile,
        }
    }
}

#[async_trait]
impl ConversionStrategy for FallbackStrategy {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn convert(
        &self,
        ctx: &ConversionContext,
        _on_progress: &ProgressFn,
        cancel: &CancellationToken,
    ) -> clipforge_av::Result<()> {
        EncoderCommand::new(&self.ffmpeg)
            .args(self.profile.args(&ctx.input, &ctx.output))
            .run(cancel)
            .await
    }
}
