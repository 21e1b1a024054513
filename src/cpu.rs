//! CPU utilization from aggregate kernel counters.
//!
//! Utilization is always the delta between two consecutive readings; a
//! single snapshot of cumulative counters says nothing about current load.

use std::path::PathBuf;

/// Aggregate CPU time counters, in clock ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCounters {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
}

impl CpuCounters {
    pub fn total(&self) -> u64 {
        self.user
            .saturating_add(self.nice)
            .saturating_add(self.system)
            .saturating_add(self.idle)
            .saturating_add(self.iowait)
    }

    /// Parse the aggregate `cpu` line of `/proc/stat`.
    pub fn parse_proc_stat(content: &str) -> Option<Self> {
        let line = content
            .lines()
            .find(|line| line.split_whitespace().next() == Some("cpu"))?;
        let mut fields = line
            .split_whitespace()
            .skip(1)
            .map(|field| field.parse::<u64>().ok());
        let mut next = || fields.next().flatten();

        Some(Self {
            user: next()?,
            nice: next()?,
            system: next()?,
            idle: next()?,
            // Very old kernels stop after idle.
            iowait: next().unwrap_or(0),
        })
    }
}

pub trait CounterSource: Send {
    fn read(&mut self) -> CpuCounters;
}

/// Reads counters from `/proc/stat`.
///
/// Unreadable or malformed input yields zeroed counters, which the sampler
/// turns into 0% utilization instead of stalling admission.
#[derive(Debug)]
pub struct ProcStat {
    path: PathBuf,
    warned: bool,
}

impl ProcStat {
    pub fn new() -> Self {
        Self::with_path("/proc/stat")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            warned: false,
        }
    }

    fn warn_once(&mut self, message: String) {
        if !self.warned {
            tracing::warn!("{}", message);
            self.warned = true;
        }
    }
}

impl Default for ProcStat {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for ProcStat {
    fn read(&mut self) -> CpuCounters {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                self.warn_once(format!(
                    "Cannot read CPU counters from {}: {}",
                    self.path.display(),
                    e
                ));
                return CpuCounters::default();
            }
        };

        match CpuCounters::parse_proc_stat(&content) {
            Some(counters) => counters,
            None => {
                self.warn_once(format!(
                    "No aggregate cpu line in {}",
                    self.path.display()
                ));
                CpuCounters::default()
            }
        }
    }
}

/// Something that reports current system load as a percentage.
pub trait LoadGauge: Send {
    fn utilization(&mut self) -> f64;
}

/// Stateful sampler that keeps the previous counter reading.
#[derive(Debug)]
pub struct CpuSampler<S = ProcStat> {
    source: S,
    last: CpuCounters,
}

impl CpuSampler<ProcStat> {
    pub fn from_proc() -> Self {
        Self::new(ProcStat::new())
    }
}

impl<S: CounterSource> CpuSampler<S> {
    /// Create a sampler primed with an initial reading.
    pub fn new(mut source: S) -> Self {
        let last = source.read();
        Self { source, last }
    }

    /// Percentage of non-idle time since the previous call, in 0..=100.
    ///
    /// Returns 0 when no ticks elapsed between readings. Counters that went
    /// backwards count as no elapsed time.
    pub fn utilization(&mut self) -> f64 {
        let current = self.source.read();
        let idle_diff = current.idle.saturating_sub(self.last.idle);
        let total_diff = current.total().saturating_sub(self.last.total());
        self.last = current;

        if total_diff == 0 {
            return 0.0;
        }

        let busy = 1.0 - idle_diff as f64 / total_diff as f64;
        (busy * 100.0).clamp(0.0, 100.0)
    }
}

impl<S: CounterSource> LoadGauge for CpuSampler<S> {
    fn utilization(&mut self) -> f64 {
        CpuSampler::utilization(self)
    }
}
