use chrono::{DateTime, Utc};
use clipforge_common::JobId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(rename = "filename")]
    pub file_name: String,
    #[serde(rename = "filesize")]
    pub file_size: u64,
    pub output_name: String,
    pub status: JobStatus,
    pub progress: f32,
    /// 1-based position in the queue; only set while the job is queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub origin: JobOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a job ended up failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Every conversion strategy failed.
    Conversion,
    /// The per-job deadline expired and the encoder was terminated.
    Timeout,
}

/// Where a job came from, kept so notifiers can reach the requester.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobOrigin {
    #[default]
    Upload,
    Chat {
        chat_id: i64,
        /// Status message to edit with progress updates
        message_id: i64,
    },
    Watcher {
        watch_path: String,
    },
    Cli,
}

impl Job {
    pub fn new(
        file_name: impl Into<String>,
        file_size: u64,
        output_name: impl Into<String>,
        origin: JobOrigin,
    ) -> Self {
        Self::with_id(JobId::new(), file_name, file_size, output_name, origin)
    }

    pub fn with_id(
        id: JobId,
        file_name: impl Into<String>,
        file_size: u64,
        output_name: impl Into<String>,
        origin: JobOrigin,
    ) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            file_size,
            output_name: output_name.into(),
            status: JobStatus::Queued,
            progress: 0.0,
            queue_position: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            error_kind: None,
            origin,
        }
    }

    pub fn start(&mut self) {
        self.status = JobStatus::Processing;
        self.progress = 0.0;
        self.queue_position = None;
        self.started_at = Some(Utc::now());
    }

    /// Raise progress to `progress` (clamped to 0..=100).
    ///
    /// Returns `false` and leaves the job untouched if the value would not
    /// increase progress.
    pub fn update_progress(&mut self, progress: f32) -> bool {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 100.0)
        };
        if progress <= self.progress {
            return false;
        }
        self.progress = progress;
        true
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.progress = 100.0;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, kind: ErrorKind, error: &str) {
        self.status = JobStatus::Failed;
        self.error = Some(error.to_string());
        self.error_kind = Some(kind);
        self.completed_at = Some(Utc::now());
    }

    /// Wall-clock time between start and completion, if both are known.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }
}

/// Number of jobs in each partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub queued: usize,
    pub processing: usize,
    /// Completed and failed jobs still held in the store.
    pub finished: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new("clip.webm", 1024, "clip.mp4", JobOrigin::Cli)
    }

    #[test]
    fn test_new_job_is_queued() {
        let job = job();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0.0);
        assert!(job.started_at.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut job = job();
        job.start();
        assert!(job.update_progress(40.0));
        assert!(!job.update_progress(30.0));
        assert!(!job.update_progress(40.0));
        assert_eq!(job.progress, 40.0);
        assert!(job.update_progress(250.0));
        assert_eq!(job.progress, 100.0);
        assert!(!job.update_progress(f32::NAN));
    }

    #[test]
    fn test_fail_records_kind_and_error() {
        let mut job = job();
        job.start();
        job.fail(ErrorKind::Timeout, "conversion timed out");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(job.error.as_deref(), Some("conversion timed out"));
        assert!(job.completed_at.is_some());
        assert!(job.elapsed().is_some());
    }

    #[test]
    fn test_complete_forces_full_progress() {
        let mut job = job();
        job.start();
        job.complete();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100.0);
        assert!(job.status.is_terminal());
    }

    #[test]
    fn test_serialized_field_names() {
        let mut job = job();
        job.queue_position = Some(1);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["filename"], "clip.webm");
        assert_eq!(json["filesize"], 1024);
        assert_eq!(json["status"], "queued");
        assert_eq!(json["queue_position"], 1);
        assert_eq!(json["origin"]["type"], "cli");
        assert!(json.get("error").is_none());
    }
}
