//! In-memory job registry.
//!
//! Jobs live in exactly one of three partitions: the FIFO queue, the set of
//! jobs being converted, and the finished set (completed and failed jobs
//! awaiting retention). Every mutation happens under one write lock and
//! publishes its resulting snapshot before the lock is released, so all
//! subscribers observe state changes in the same order.

mod types;

pub use types::*;

use crate::events::{EventBus, JobEvent, JobEventKind};
use clipforge_common::{Error, JobId, Result};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Partitions {
    queued: VecDeque<Job>,
    processing: HashMap<JobId, Job>,
    finished: HashMap<JobId, Job>,
}

impl Partitions {
    fn renumber(&mut self) {
        for (index, job) in self.queued.iter_mut().enumerate() {
            job.queue_position = Some(index + 1);
        }
    }

    fn find(&self, id: JobId) -> Option<&Job> {
        self.queued
            .iter()
            .find(|job| job.id == id)
            .or_else(|| self.processing.get(&id))
            .or_else(|| self.finished.get(&id))
    }

    fn contains(&self, id: JobId) -> bool {
        self.find(id).is_some()
    }
}

/// Write transaction over the store.
///
/// Obtained through [`JobStore::write`]; the lock is held for the lifetime of
/// the closure, so a sequence of calls is atomic to every other observer.
pub struct StoreTxn<'a> {
    parts: &'a mut Partitions,
    events: &'a EventBus,
}

impl StoreTxn<'_> {
    pub fn queued_len(&self) -> usize {
        self.parts.queued.len()
    }

    pub fn processing_len(&self) -> usize {
        self.parts.processing.len()
    }

    /// Remove the head of the queue and renumber the remainder.
    ///
    /// The returned job belongs to no partition; hand it to
    /// [`StoreTxn::mark_processing`] before the transaction ends.
    pub fn take_next(&mut self) -> Option<Job> {
        let mut job = self.parts.queued.pop_front()?;
        job.queue_position = None;
        self.parts.renumber();
        Some(job)
    }

    /// Place a job taken from the queue into the processing set.
    pub fn mark_processing(&mut self, mut job: Job) -> Job {
        job.start();
        self.parts.processing.insert(job.id, job.clone());
        self.events
            .publish(&JobEvent::new(JobEventKind::Started, job.clone()));
        job
    }
}

pub struct JobStore {
    parts: RwLock<Partitions>,
    events: Arc<EventBus>,
}

impl JobStore {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            parts: RwLock::new(Partitions::default()),
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Run `f` with exclusive access to the store.
    pub fn write<R>(&self, f: impl FnOnce(&mut StoreTxn<'_>) -> R) -> R {
        let mut parts = self.parts.write();
        let mut txn = StoreTxn {
            parts: &mut *parts,
            events: &self.events,
        };
        f(&mut txn)
    }

    /// Append a job to the tail of the queue and return its 1-based position.
    pub fn enqueue(&self, mut job: Job) -> Result<usize> {
        let mut parts = self.parts.write();
        if parts.contains(job.id) {
            return Err(Error::invalid_input(format!("Job {} already exists", job.id)));
        }

        job.status = JobStatus::Queued;
        job.progress = 0.0;
        parts.queued.push_back(job);
        let position = parts.queued.len();
        if let Some(job) = parts.queued.back_mut() {
            job.queue_position = Some(position);
            self.events
                .publish(&JobEvent::new(JobEventKind::Queued, job.clone()));
        }
        Ok(position)
    }

    /// Move a specific queued job into processing.
    pub fn mark_processing(&self, id: JobId) -> Result<Job> {
        self.write(|tx| {
            let index = tx
                .parts
                .queued
                .iter()
                .position(|job| job.id == id)
                .ok_or_else(|| not_in(&*tx.parts, id, "queued"))?;
            let mut job = tx
                .parts
                .queued
                .remove(index)
                .ok_or_else(|| Error::internal("queue index out of range"))?;
            job.queue_position = None;
            tx.parts.renumber();
            Ok(tx.mark_processing(job))
        })
    }

    /// Admit the head of the queue unless `max_concurrent` jobs are running.
    pub fn admit_next(&self, max_concurrent: usize) -> Option<Job> {
        self.write(|tx| {
            if tx.processing_len() >= max_concurrent {
                return None;
            }
            let job = tx.take_next()?;
            Some(tx.mark_processing(job))
        })
    }

    pub fn mark_completed(&self, id: JobId) -> Result<Job> {
        let mut parts = self.parts.write();
        let mut job = match parts.processing.remove(&id) {
            Some(job) => job,
            None => return Err(not_in(&*parts, id, "processing")),
        };
        job.complete();
        parts.finished.insert(id, job.clone());
        self.events
            .publish(&JobEvent::new(JobEventKind::Completed, job.clone()));
        Ok(job)
    }

    pub fn mark_failed(&self, id: JobId, kind: ErrorKind, error: &str) -> Result<Job> {
        let mut parts = self.parts.write();
        let mut job = match parts.processing.remove(&id) {
            Some(job) => job,
            None => return Err(not_in(&*parts, id, "processing")),
        };
        job.fail(kind, error);
        parts.finished.insert(id, job.clone());
        self.events
            .publish(&JobEvent::new(JobEventKind::Failed, job.clone()));
        Ok(job)
    }

    /// Raise the progress of a processing job.
    ///
    /// Returns the new snapshot, or `None` if the job is not processing or
    /// the value would not increase progress.
    pub fn update_progress(&self, id: JobId, progress: f32) -> Option<Job> {
        let mut parts = self.parts.write();
        let job = parts.processing.get_mut(&id)?;
        if !job.update_progress(progress) {
            return None;
        }
        let snapshot = job.clone();
        self.events
            .publish(&JobEvent::new(JobEventKind::Progress, snapshot.clone()));
        Some(snapshot)
    }

    /// Remove a finished job if it is still in `status`.
    pub fn purge(&self, id: JobId, status: JobStatus) -> Option<Job> {
        let mut parts = self.parts.write();
        if parts.finished.get(&id)?.status != status {
            return None;
        }
        let job = parts.finished.remove(&id)?;
        self.events
            .publish(&JobEvent::new(JobEventKind::Purged, job.clone()));
        Some(job)
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.parts.read().find(id).cloned()
    }

    /// All jobs: queue order first, then processing by start time, then
    /// finished jobs by completion time.
    pub fn list(&self) -> Vec<Job> {
        let parts = self.parts.read();
        let mut processing: Vec<Job> = parts.processing.values().cloned().collect();
        processing.sort_by_key(|job| job.started_at);
        let mut finished: Vec<Job> = parts.finished.values().cloned().collect();
        finished.sort_by_key(|job| job.completed_at);

        parts
            .queued
            .iter()
            .cloned()
            .chain(processing)
            .chain(finished)
            .collect()
    }

    pub fn counts(&self) -> QueueCounts {
        let parts = self.parts.read();
        QueueCounts {
            queued: parts.queued.len(),
            processing: parts.processing.len(),
            finished: parts.finished.len(),
        }
    }
}

fn not_in(parts: &Partitions, id: JobId, partition: &str) -> Error {
    match parts.find(id) {
        Some(job) => Error::invalid_input(format!(
            "Job {} is {}, not {}",
            id, job.status, partition
        )),
        None => Error::not_found(id.to_string()),
    }
}
