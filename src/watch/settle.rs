use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

/// Tracks files and determines when they've "settled" (stopped changing)
#[derive(Debug)]
pub struct FileSettleTracker {
    /// Last time each file was reported as changed
    pending: HashMap<PathBuf, Instant>,
    settle_duration: Duration,
}

impl FileSettleTracker {
    pub fn new(settle_duration: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            settle_duration,
        }
    }

    /// Record that a file was created or written to
    pub fn file_changed(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now);
    }

    /// Stop tracking a file, e.g. after it was deleted or moved away
    pub fn remove(&mut self, path: &Path) -> bool {
        self.pending.remove(path).is_some()
    }

    /// Remove and return every file unchanged for the settle duration
    pub fn take_settled(&mut self, now: Instant) -> Vec<PathBuf> {
        let settle = self.settle_duration;
        let mut settled: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, last_change)| now.saturating_duration_since(**last_change) >= settle)
            .map(|(path, _)| path.clone())
            .collect();
        settled.sort();

        for path in &settled {
            self.pending.remove(path);
        }
        settled
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_settles_after_quiet_period() {
        let start = Instant::now();
        let mut tracker = FileSettleTracker::new(Duration::from_secs(5));
        tracker.file_changed(PathBuf::from("/drop/a.webm"), start);

        assert!(tracker.take_settled(start + Duration::from_secs(4)).is_empty());
        assert_eq!(
            tracker.take_settled(start + Duration::from_secs(5)),
            vec![PathBuf::from("/drop/a.webm")]
        );
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_new_writes_restart_the_clock() {
        let start = Instant::now();
        let mut tracker = FileSettleTracker::new(Duration::from_secs(5));
        let path = PathBuf::from("/drop/a.webm");
        tracker.file_changed(path.clone(), start);
        tracker.file_changed(path.clone(), start + Duration::from_secs(3));

        assert!(tracker.take_settled(start + Duration::from_secs(6)).is_empty());
        assert_eq!(tracker.take_settled(start + Duration::from_secs(8)), vec![path]);
    }

    #[test]
    fn test_removed_file_never_settles() {
        let start = Instant::now();
        let mut tracker = FileSettleTracker::new(Duration::from_secs(1));
        let path = PathBuf::from("/drop/a.webm");
        tracker.file_changed(path.clone(), start);
        assert!(tracker.remove(&path));
        assert!(!tracker.remove(&path));
        assert!(tracker.take_settled(start + Duration::from_secs(10)).is_empty());
    }
}
