//! Conversion job executor.
//!
//! Runs an ordered list of strategies for one job until one succeeds, all
//! under a single deadline.

use super::profile::{FallbackProfile, PrimaryProfile};
use super::strategy::{
    ConversionContext, ConversionStrategy, FallbackStrategy, PrimaryStrategy, ProgressFn,
};
use crate::config::ToolsConfig;
use crate::state::ErrorKind;
use clipforge_av::resolve_tool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default wall-clock budget for all attempts of one job.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("conversion timed out after {}", format_deadline(.deadline))]
    Timeout { deadline: Duration },

    /// Message is the last attempt's error, verbatim.
    #[error("{message}")]
    Failed { strategy: String, message: String },

    #[error("no conversion strategies configured")]
    NoStrategies,
}

/// Whole minutes when the deadline divides evenly, seconds otherwise.
fn format_deadline(deadline: &Duration) -> String {
    let secs = deadline.as_secs();
    match secs {
        60 => "1 minute".to_string(),
        s if s > 0 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        0 => format!("{}ms", deadline.as_millis()),
        s => format!("{} seconds", s),
    }
}

impl ConversionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::Timeout { .. } => ErrorKind::Timeout,
            _ => ErrorKind::Conversion,
        }
    }
}

/// Which strategy produced the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub strategy: String,
    pub attempts: usize,
}

pub struct ConversionExecutor {
    strategies: Vec<Arc<dyn ConversionStrategy>>,
    deadline: Duration,
}

impl ConversionExecutor {
    pub fn new(strategies: Vec<Arc<dyn ConversionStrategy>>, deadline: Duration) -> Self {
        Self {
            strategies,
            deadline,
        }
    }

    /// Primary then (if enabled) fallback, using the configured tool paths.
    pub fn from_profiles(
        primary: &PrimaryProfile,
        fallback: &FallbackProfile,
        tools: &ToolsConfig,
        deadline: Duration,
    ) -> Self {
        let ffmpeg = resolve_tool("ffmpeg", tools.ffmpeg_path.as_deref());
        let ffprobe = resolve_tool("ffprobe", tools.ffprobe_path.as_deref());

        let mut strategies: Vec<Arc<dyn ConversionStrategy>> = vec![Arc::new(
            PrimaryStrategy::new(ffmpeg.clone(), ffprobe, primary.clone()),
        )];
        if fallback.enabled {
            strategies.push(Arc::new(FallbackStrategy::new(ffmpeg, fallback.clone())));
        }

        Self::new(strategies, deadline)
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Convert one job.
    ///
    /// On deadline expiry the running encoder is killed and reaped before
    /// this returns [`ConversionError::Timeout`]; no further strategy starts.
    pub async fn run(
        &self,
        ctx: &ConversionContext,
        on_progress: &ProgressFn,
    ) -> Result<ConversionOutcome, ConversionError> {
        let cancel = CancellationToken::new();
        let attempts = self.attempt_all(ctx, on_progress, &cancel);
        tokio::pin!(attempts);

        tokio::select! {
            result = &mut attempts => result,
            _ = tokio::time::sleep(self.deadline) => {
                warn!(
                    "Job {} exceeded {:?} deadline, terminating encoder",
                    ctx.job_id, self.deadline
                );
                cancel.cancel();
                // Wait for the running attempt to kill and reap its process.
                let _ = attempts.await;
                Err(ConversionError::Timeout {
                    deadline: self.deadline,
                })
            }
        }
    }

    async fn attempt_all(
        &self,
        ctx: &ConversionContext,
        on_progress: &ProgressFn,
        cancel: &CancellationToken,
    ) -> Result<ConversionOutcome, ConversionError> {
        let mut last_error = None;

        for (index, strategy) in self.strategies.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            match strategy.convert(ctx, on_progress, cancel).await {
                Ok(()) => {
                    if index > 0 {
                        info!(
                            "Job {} converted with {} strategy",
                            ctx.job_id,
                            strategy.name()
                        );
                    }
                    return Ok(ConversionOutcome {
                        strategy: strategy.name().to_string(),
                        attempts: index + 1,
                    });
                }
                Err(e) if e.is_cancelled() => {
                    return Err(ConversionError::Failed {
                        strategy: strategy.name().to_string(),
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    match self.strategies.get(index + 1) {
                        Some(next) => warn!(
                            "{} conversion failed for job {}, trying {}: {}",
                            strategy.name(),
                            ctx.job_id,
                            next.name(),
                            e
                        ),
                        None => warn!(
                            "{} conversion failed for job {}: {}",
                            strategy.name(),
                            ctx.job_id,
                            e
                        ),
                    }
                    last_error = Some(ConversionError::Failed {
                        strategy: strategy.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(last_error.unwrap_or(ConversionError::NoStrategies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use clipforge_common::JobId;
    use parking_lot::Mutex;
    use std::path::PathBuf;

    /// Strategy that records its calls and returns a fixed result.
    struct Fake {
        name: &'static str,
        fail_with: Option<&'static str>,
        hang: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl ConversionStrategy for Fake {
        fn name(&self) -> &str {
            self.name
        }

        async fn convert(
            &self,
            _ctx: &ConversionContext,
            on_progress: &ProgressFn,
            cancel: &CancellationToken,
        ) -> clipforge_av::Result<()> {
            self.calls.lock().push(self.name);
            on_progress(50.0);
            if self.hang {
                cancel.cancelled().await;
                return Err(clipforge_av::Error::Cancelled {
                    tool: self.name.to_string(),
                });
            }
            match self.fail_with {
                Some(message) => Err(clipforge_av::Error::parse_error(self.name, message)),
                None => Ok(()),
            }
        }
    }

    fn ctx() -> ConversionContext {
        ConversionContext {
            job_id: JobId::new(),
            input: PathBuf::from("in.webm"),
            output: PathBuf::from("out.mp4"),
        }
    }

    fn executor(
        specs: &[(&'static str, Option<&'static str>, bool)],
        deadline: Duration,
    ) -> (ConversionExecutor, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let strategies = specs
            .iter()
            .map(|(name, fail_with, hang)| {
                Arc::new(Fake {
                    name: *name,
                    fail_with: *fail_with,
                    hang: *hang,
                    calls: calls.clone(),
                }) as Arc<dyn ConversionStrategy>
            })
            .collect();
        (ConversionExecutor::new(strategies, deadline), calls)
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let (executor, calls) = executor(
            &[("primary", None, false), ("fallback", None, false)],
            DEFAULT_DEADLINE,
        );
        let outcome = executor.run(&ctx(), &|_| {}).await.unwrap();
        assert_eq!(outcome.strategy, "primary");
        assert_eq!(outcome.attempts, 1);
        assert_eq!(*calls.lock(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_fallback_after_primary_failure() {
        let (executor, calls) = executor(
            &[("primary", Some("bad codec"), false), ("fallback", None, false)],
            DEFAULT_DEADLINE,
        );
        let outcome = executor.run(&ctx(), &|_| {}).await.unwrap();
        assert_eq!(outcome.strategy, "fallback");
        assert_eq!(outcome.attempts, 2);
        assert_eq!(*calls.lock(), vec!["primary", "fallback"]);
    }

    #[tokio::test]
    async fn test_last_error_is_reported_verbatim() {
        let (executor, calls) = executor(
            &[
                ("primary", Some("first problem"), false),
                ("fallback", Some("second problem"), false),
            ],
            DEFAULT_DEADLINE,
        );
        let err = executor.run(&ctx(), &|_| {}).await.unwrap_err();
        assert_eq!(calls.lock().len(), 2);
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert_matches!(err, ConversionError::Failed { ref strategy, ref message } => {
            assert_eq!(strategy, "fallback");
            assert_eq!(message, "failed to parse fallback output: second problem");
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_skips_remaining_strategies() {
        let (executor, calls) = executor(
            &[("primary", None, true), ("fallback", None, false)],
            Duration::from_secs(60),
        );
        let err = executor.run(&ctx(), &|_| {}).await.unwrap_err();
        assert_matches!(err, ConversionError::Timeout { .. });
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(*calls.lock(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_progress_is_forwarded() {
        let (executor, _) = executor(&[("primary", None, false)], DEFAULT_DEADLINE);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        executor
            .run(&ctx(), &move |p: f64| sink.lock().push(p))
            .await
            .unwrap();
        assert_eq!(*seen.lock(), vec![50.0]);
    }

    #[tokio::test]
    async fn test_empty_strategy_list() {
        let (executor, _) = executor(&[], DEFAULT_DEADLINE);
        assert_matches!(
            executor.run(&ctx(), &|_| {}).await,
            Err(ConversionError::NoStrategies)
        );
    }

    #[test]
    fn test_from_profiles_respects_fallback_switch() {
        let tools = ToolsConfig::default();
        let executor = ConversionExecutor::from_profiles(
            &PrimaryProfile::default(),
            &FallbackProfile::default(),
            &tools,
            DEFAULT_DEADLINE,
        );
        assert_eq!(executor.strategy_names(), vec!["primary", "fallback"]);

        let disabled = FallbackProfile {
            enabled: false,
            ..Default::default()
        };
        let executor = ConversionExecutor::from_profiles(
            &PrimaryProfile::default(),
            &disabled,
            &tools,
            DEFAULT_DEADLINE,
        );
        assert_eq!(executor.strategy_names(), vec!["primary"]);
    }

    #[test]
    fn test_timeout_message() {
        let err = ConversionError::Timeout {
            deadline: DEFAULT_DEADLINE,
        };
        assert_eq!(err.to_string(), "conversion timed out after 30 minutes");
    }

    #[test]
    fn test_short_deadlines_are_not_rounded_to_zero_minutes() {
        let message = |deadline| ConversionError::Timeout { deadline }.to_string();
        assert_eq!(message(Duration::from_secs(90)), "conversion timed out after 90 seconds");
        assert_eq!(message(Duration::from_secs(60)), "conversion timed out after 1 minute");
        assert_eq!(message(Duration::from_secs(1)), "conversion timed out after 1 second");
        assert_eq!(message(Duration::from_millis(500)), "conversion timed out after 500ms");
    }
}
