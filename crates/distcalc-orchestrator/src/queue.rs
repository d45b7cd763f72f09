//! Bounded FIFO of jobs waiting for dispatch.

use tokio::sync::mpsc;

use crate::error::JobError;
use crate::job::JobId;

/// Sending half, shared by submission and retries.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<JobId>,
    capacity: usize,
}

/// Receiving half, owned by the dispatch loop.
pub struct JobReceiver {
    rx: mpsc::Receiver<JobId>,
}

/// Creates a queue holding at most `capacity` job ids.
pub fn job_queue(capacity: usize) -> (JobQueue, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (JobQueue { tx, capacity }, JobReceiver { rx })
}

/// A queue position held ahead of the job it will carry.
///
/// Dropping the slot unused gives the position back.
pub struct QueueSlot<'a> {
    permit: mpsc::Permit<'a, JobId>,
}

impl QueueSlot<'_> {
    pub fn enqueue(self, id: JobId) {
        self.permit.send(id);
    }
}

impl JobQueue {
    /// Holds a position in the queue without waiting.
    pub fn try_reserve(&self) -> Result<QueueSlot<'_>, JobError> {
        self.tx
            .try_reserve()
            .map(|permit| QueueSlot { permit })
            .map_err(|_| JobError::QueueFull)
    }

    /// Enqueues without waiting.
    pub fn try_enqueue(&self, id: JobId) -> Result<(), JobError> {
        self.tx.try_send(id).map_err(|_| JobError::QueueFull)
    }

    /// Enqueues, waiting for room. Returns `false` if the dispatch loop is
    /// gone.
    pub async fn enqueue(&self, id: JobId) -> bool {
        self.tx.send(id).await.is_ok()
    }

    /// Jobs currently waiting.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl JobReceiver {
    pub async fn next(&mut self) -> Option<JobId> {
        self.rx.recv().await
    }
}
