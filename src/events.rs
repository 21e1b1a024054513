//! Job event fan-out.
//!
//! Every subscriber owns a bounded queue. Publishing never blocks: a full
//! queue loses that one event for that subscriber, a closed queue removes the
//! subscriber. Nothing is replayed to late subscribers; they should pull the
//! current state from the store instead.

use crate::state::Job;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;

/// Default per-subscriber queue length.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Queued,
    Started,
    Progress,
    Completed,
    Failed,
    Purged,
}

/// Snapshot of a job taken at the moment of a state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    #[serde(rename = "event")]
    pub kind: JobEventKind,
    pub job: Job,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(kind: JobEventKind, job: Job) -> Self {
        Self {
            kind,
            job,
            timestamp: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, JobEventKind::Completed | JobEventKind::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

/// Receiving side of a subscription.
///
/// Dropping it closes the queue; the bus notices on the next publish and
/// forgets the subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<JobEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. Returns `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<JobEvent> {
        self.rx.try_recv().ok()
    }

    pub fn into_stream(self) -> ReceiverStream<JobEvent> {
        ReceiverStream::new(self.rx)
    }
}

pub struct EventBus {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<JobEvent>>>,
    next_id: AtomicU64,
    buffer: usize,
    dropped: AtomicU64,
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.buffer);
        self.subscribers.write().insert(id, tx);
        tracing::debug!("Added {}", id);
        Subscription { id, rx }
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Removed {}", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Events lost to full subscriber queues since startup.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Offer `event` to every subscriber without waiting.
    ///
    /// Returns the number of subscribers that accepted it.
    pub fn publish(&self, event: &JobEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let subscribers = self.subscribers.read();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!("{} is lagging, dropped {:?} event", id, event.kind);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in closed {
                subscribers.remove(&id);
                tracing::debug!("{} disconnected, removed", id);
            }
        }

        delivered
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}
