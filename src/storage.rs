//! On-disk layout of job artifacts.
//!
//! Inputs live in the upload directory as `{job_id}_{file_name}` and outputs
//! in the output directory as `{job_id}_{output_name}`, so two jobs never
//! share a path even when their names collide. The encoder writes into the
//! temp directory; only finished files are moved into the output directory.

use crate::config::StorageConfig;
use crate::state::Job;
use clipforge_common::JobId;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// How an input file is brought into the upload directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingMode {
    /// Rename into place, copying when the source is on another filesystem.
    #[default]
    Move,
    /// Leave the source untouched.
    Copy,
}

#[derive(Debug, Clone)]
pub struct StorageLayout {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    temp_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.upload_dir, &config.output_dir, &config.temp_dir)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [&self.upload_dir, &self.output_dir, &self.temp_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    pub fn input_path(&self, job: &Job) -> PathBuf {
        self.input_path_for(job.id, &job.file_name)
    }

    pub fn input_path_for(&self, id: JobId, file_name: &str) -> PathBuf {
        self.upload_dir.join(format!("{}_{}", id, file_name))
    }

    pub fn output_path(&self, job: &Job) -> PathBuf {
        self.output_path_for(job.id, &job.output_name)
    }

    pub fn output_path_for(&self, id: JobId, output_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}_{}", id, output_name))
    }

    /// Where the encoder writes `job`'s output while it is in progress.
    pub fn work_path(&self, job: &Job) -> PathBuf {
        self.temp_dir.join(format!("{}_{}", job.id, job.output_name))
    }

    /// Move a finished file from its work path to the output path of `job`.
    pub async fn publish_output(&self, job: &Job, work: &Path) -> io::Result<PathBuf> {
        let target = self.output_path(job);
        move_file(work, &target).await?;
        Ok(target)
    }

    /// Place `source` at the input path of job `id` and return its size.
    pub async fn stage_input(
        &self,
        id: JobId,
        file_name: &str,
        source: &Path,
        mode: StagingMode,
    ) -> io::Result<u64> {
        let target = self.input_path_for(id, file_name);

        match mode {
            StagingMode::Copy => {
                tokio::fs::copy(source, &target).await?;
            }
            StagingMode::Move => move_file(source, &target).await?,
        }

        Ok(tokio::fs::metadata(&target).await?.len())
    }
}

/// Rename `source` to `target`, copying when they are on different filesystems.
async fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    if let Err(e) = tokio::fs::rename(source, target).await {
        // Most likely a cross-device rename; anything else fails the copy too.
        tracing::debug!("Rename of {:?} failed ({}), copying instead", source, e);
        tokio::fs::copy(source, target).await?;
        if let Err(e) = tokio::fs::remove_file(source).await {
            tracing::warn!("Copied {:?} but could not remove it: {}", source, e);
        }
    }
    Ok(())
}

/// Delete a file, treating "already gone" as success.
pub async fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::JobOrigin;
    use tempfile::tempdir;

    fn layout(root: &Path) -> StorageLayout {
        StorageLayout::new(root.join("up"), root.join("out"), root.join("tmp"))
    }

    #[test]
    fn test_paths_are_prefixed_with_job_id() {
        let layout = StorageLayout::new("/up", "/out", "/tmp");
        let job = Job::new("clip.webm", 1, "clip.mp4", JobOrigin::Upload);
        assert_eq!(
            layout.input_path(&job),
            PathBuf::from(format!("/up/{}_clip.webm", job.id))
        );
        assert_eq!(
            layout.output_path(&job),
            PathBuf::from(format!("/out/{}_clip.mp4", job.id))
        );
        assert_eq!(
            layout.work_path(&job),
            PathBuf::from(format!("/tmp/{}_clip.mp4", job.id))
        );
    }

    #[tokio::test]
    async fn test_publish_output_moves_work_file() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        layout.ensure_dirs().await.unwrap();
        let job = Job::new("clip.webm", 1, "clip.mp4", JobOrigin::Upload);
        let work = layout.work_path(&job);
        std::fs::write(&work, b"mp4").unwrap();

        let published = layout.publish_output(&job, &work).await.unwrap();
        assert_eq!(published, layout.output_path(&job));
        assert_eq!(std::fs::read(&published).unwrap(), b"mp4");
        assert!(!work.exists());
    }

    #[tokio::test]
    async fn test_stage_move_removes_source() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        layout.ensure_dirs().await.unwrap();
        let source = dir.path().join("clip.webm");
        std::fs::write(&source, b"12345").unwrap();

        let id = JobId::new();
        let size = layout
            .stage_input(id, "clip.webm", &source, StagingMode::Move)
            .await
            .unwrap();
        assert_eq!(size, 5);
        assert!(!source.exists());
        assert!(layout.input_path_for(id, "clip.webm").exists());
    }

    #[tokio::test]
    async fn test_stage_copy_keeps_source() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        layout.ensure_dirs().await.unwrap();
        let source = dir.path().join("clip.webm");
        std::fs::write(&source, b"abc").unwrap();

        let id = JobId::new();
        layout
            .stage_input(id, "clip.webm", &source, StagingMode::Copy)
            .await
            .unwrap();
        assert!(source.exists());
        assert!(layout.input_path_for(id, "clip.webm").exists());
    }

    #[tokio::test]
    async fn test_stage_missing_source_fails() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        layout.ensure_dirs().await.unwrap();
        let result = layout
            .stage_input(
                JobId::new(),
                "missing.webm",
                &dir.path().join("missing.webm"),
                StagingMode::Move,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_remove_if_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file");
        std::fs::write(&path, b"x").unwrap();
        assert!(remove_if_exists(&path).await.unwrap());
        assert!(!remove_if_exists(&path).await.unwrap());
    }
}
