use crate::conversion::{FallbackProfile, PrimaryProfile};
use crate::naming::RenameMode;
use crate::storage::StagingMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Maximum number of simultaneous conversions (default: 2)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// CPU utilization percentage above which no new job starts (default: 70)
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: f64,

    /// Scheduler poll interval while CPU is at or under the threshold
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Scheduler poll interval while CPU is above the threshold
    #[serde(default = "default_throttled_interval_ms")]
    pub throttled_interval_ms: u64,

    /// Events buffered per subscriber before new ones are dropped
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_max_concurrent() -> usize {
    2
}

fn default_cpu_threshold() -> f64 {
    70.0
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_throttled_interval_ms() -> u64 {
    5000
}

fn default_event_buffer() -> usize {
    crate::events::DEFAULT_SUBSCRIBER_BUFFER
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            cpu_threshold: default_cpu_threshold(),
            poll_interval_ms: default_poll_interval_ms(),
            throttled_interval_ms: default_throttled_interval_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn throttled_interval(&self) -> Duration {
        Duration::from_millis(self.throttled_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// How inputs are brought into the upload directory (default: move)
    #[serde(default)]
    pub staging: StagingMode,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./web-uploads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./web-output")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./web-temp")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
            temp_dir: default_temp_dir(),
            staging: StagingMode::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Time limit for all attempts of one job (default: 1800 = 30 minutes)
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// How long completed outputs stay downloadable (default: 3600 = 1 hour)
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Purge failed job records after this many seconds (default: keep)
    #[serde(default)]
    pub failed_retention_secs: Option<u64>,

    #[serde(default)]
    pub primary: PrimaryProfile,

    #[serde(default)]
    pub fallback: FallbackProfile,
}

fn default_deadline_secs() -> u64 {
    30 * 60
}

fn default_retention_secs() -> u64 {
    60 * 60
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            retention_secs: default_retention_secs(),
            failed_retention_secs: None,
            primary: PrimaryProfile::default(),
            fallback: FallbackProfile::default(),
        }
    }
}

impl ConversionConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn failed_retention(&self) -> Option<Duration> {
        self.failed_retention_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Seconds a file must stay unchanged before it is picked up
    #[serde(default = "default_settle_time")]
    pub settle_time_secs: u64,

    /// Extensions to pick up (default: webm)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Output naming for picked-up files (default: original)
    #[serde(default)]
    pub rename: RenameMode,
}

fn default_settle_time() -> u64 {
    5
}

fn default_extensions() -> Vec<String> {
    clipforge_common::paths::DEFAULT_INPUT_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .collect()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            paths: Vec::new(),
            settle_time_secs: default_settle_time(),
            extensions: default_extensions(),
            rename: RenameMode::default(),
        }
    }
}
