//! Admission control.
//!
//! A single polling loop moves jobs from the queue into processing. A job is
//! admitted only while fewer than `max_concurrent` jobs are running and CPU
//! utilization is at or under the threshold. Admitted jobs are handed to a
//! [`JobDispatcher`] so the loop never waits on a conversion.

use crate::config::EngineConfig;
use crate::cpu::LoadGauge;
use crate::state::{Job, JobStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receives jobs that were just moved into processing.
pub trait JobDispatcher: Send + Sync {
    fn dispatch(&self, job: Job);
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub max_concurrent: usize,
    pub cpu_threshold: f64,
    pub poll_interval: Duration,
    pub throttled_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for SchedulerSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            cpu_threshold: config.cpu_threshold,
            poll_interval: config.poll_interval(),
            throttled_interval: config.throttled_interval(),
        }
    }
}

/// Outcome of one admission attempt.
#[derive(Debug, Clone)]
pub enum AdmissionDecision {
    /// The head of the queue moved into processing.
    Admitted(Job),
    /// Nothing is queued.
    Idle,
    /// `max_concurrent` jobs are already running.
    Saturated,
    /// A slot was free but CPU utilization was over the threshold.
    CpuDenied,
}

impl AdmissionDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admitted(_))
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub decision: AdmissionDecision,
    pub utilization: f64,
    /// How long the loop waits before the next cycle.
    pub next_delay: Duration,
}

pub struct Scheduler {
    store: Arc<JobStore>,
    dispatcher: Arc<dyn JobDispatcher>,
    gauge: Box<dyn LoadGauge>,
    sleeper: Arc<dyn Sleeper>,
    settings: SchedulerSettings,
}

impl Scheduler {
    pub fn new(
        store: Arc<JobStore>,
        dispatcher: Arc<dyn JobDispatcher>,
        gauge: Box<dyn LoadGauge>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            dispatcher,
            gauge,
            sleeper: Arc::new(TokioSleeper),
            settings,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Sample the CPU, admit at most one job, and dispatch it.
    pub fn run_cycle(&mut self) -> CycleReport {
        let utilization = self.gauge.utilization();
        let cpu_ok = utilization <= self.settings.cpu_threshold;
        let max_concurrent = self.settings.max_concurrent;

        let decision = self.store.write(|tx| {
            if tx.queued_len() == 0 {
                return AdmissionDecision::Idle;
            }
            if tx.processing_len() >= max_concurrent {
                return AdmissionDecision::Saturated;
            }
            if !cpu_ok {
                return AdmissionDecision::CpuDenied;
            }
            match tx.take_next() {
                Some(job) => AdmissionDecision::Admitted(tx.mark_processing(job)),
                None => AdmissionDecision::Idle,
            }
        });

        match &decision {
            AdmissionDecision::Admitted(job) => {
                info!(
                    "Starting job {} ({}) at CPU {:.1}%",
                    job.id, job.file_name, utilization
                );
                self.dispatcher.dispatch(job.clone());
            }
            AdmissionDecision::CpuDenied => {
                warn!("CPU usage too high ({:.1}%), holding queue", utilization);
            }
            AdmissionDecision::Saturated => {
                debug!("All {} conversion slots busy", max_concurrent);
            }
            AdmissionDecision::Idle => {}
        }

        let next_delay = if cpu_ok {
            self.settings.poll_interval
        } else {
            self.settings.throttled_interval
        };

        CycleReport {
            decision,
            utilization,
            next_delay,
        }
    }

    /// Run cycles until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            "Scheduler started (max {} concurrent, CPU threshold {:.0}%)",
            self.settings.max_concurrent, self.settings.cpu_threshold
        );

        while !shutdown.is_cancelled() {
            let report = self.run_cycle();
            let sleeper = self.sleeper.clone();

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                _ = sleeper.sleep(report.next_delay) => {}
            }
        }

        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::state::{JobOrigin, JobStatus};
    use assert_matches::assert_matches;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Job>>);

    impl JobDispatcher for Recorder {
        fn dispatch(&self, job: Job) {
            self.0.lock().push(job);
        }
    }

    struct FixedLoad(f64);

    impl LoadGauge for FixedLoad {
        fn utilization(&mut self) -> f64 {
            self.0
        }
    }

    fn setup(jobs: usize, load: f64) -> (Arc<JobStore>, Arc<Recorder>, Scheduler) {
        let store = Arc::new(JobStore::new(Arc::new(EventBus::default())));
        for i in 0..jobs {
            let name = format!("{}.webm", i);
            store
                .enqueue(Job::new(name.clone(), 1, name, JobOrigin::Cli))
                .unwrap();
        }
        let recorder = Arc::new(Recorder::default());
        let scheduler = Scheduler::new(
            store.clone(),
            recorder.clone(),
            Box::new(FixedLoad(load)),
            SchedulerSettings::default(),
        );
        (store, recorder, scheduler)
    }

    #[test]
    fn test_admits_up_to_limit() {
        let (store, recorder, mut scheduler) = setup(3, 10.0);

        assert!(scheduler.run_cycle().decision.is_admitted());
        assert!(scheduler.run_cycle().decision.is_admitted());
        let third = scheduler.run_cycle();
        assert_matches!(third.decision, AdmissionDecision::Saturated);
        assert_eq!(third.next_delay, Duration::from_secs(2));

        assert_eq!(recorder.0.lock().len(), 2);
        let counts = store.counts();
        assert_eq!(counts.processing, 2);
        assert_eq!(counts.queued, 1);
        let queued: Vec<_> = store
            .list()
            .into_iter()
            .filter(|j| j.status == JobStatus::Queued)
            .collect();
        assert_eq!(queued[0].queue_position, Some(1));
    }

    #[test]
    fn test_cpu_gate_blocks_admission() {
        let (store, recorder, mut scheduler) = setup(1, 85.0);
        let report = scheduler.run_cycle();
        assert_matches!(report.decision, AdmissionDecision::CpuDenied);
        assert_eq!(report.next_delay, Duration::from_secs(5));
        assert!(recorder.0.lock().is_empty());
        assert_eq!(store.counts().queued, 1);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let (_, _, mut scheduler) = setup(1, 70.0);
        let report = scheduler.run_cycle();
        assert!(report.decision.is_admitted());
        assert_eq!(report.next_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_idle_queue_backs_off_when_cpu_high() {
        let (_, _, mut scheduler) = setup(0, 95.0);
        let report = scheduler.run_cycle();
        assert_matches!(report.decision, AdmissionDecision::Idle);
        assert_eq!(report.next_delay, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let (store, recorder, scheduler) = setup(3, 0.0);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(recorder.0.lock().len(), 2);
        assert_eq!(store.counts().processing, 2);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
