//! In-process FIFO hand-off of job records from producers to the worker.
//!
//! Any number of producer tasks may enqueue concurrently; exactly one
//! consumer (the worker) dequeues. The queue itself is not durable - a
//! queued job survives a restart only through the durable store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::model::JobRecord;

/// Unbounded multi-producer single-consumer job queue.
pub struct JobQueue {
    tx: mpsc::UnboundedSender<JobRecord>,
    rx: Mutex<mpsc::UnboundedReceiver<JobRecord>>,
    depth: AtomicUsize,
}

impl JobQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            depth: AtomicUsize::new(0),
        }
    }

    /// Append a record. Never blocks, never rejects.
    pub fn enqueue(&self, record: JobRecord) {
        self.depth.fetch_add(1, Ordering::Relaxed);
        // The receiver lives as long as the queue, so the channel cannot
        // be closed from under us.
        let _ = self.tx.send(record);
    }

    /// Remove and return the oldest record, or `None` once `timeout`
    /// elapses with nothing available.
    ///
    /// The short timeout is what lets the worker loop periodically
    /// re-check its running flag.
    pub async fn dequeue(&self, timeout: Duration) -> Option<JobRecord> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(record)) => {
                self.depth.fetch_sub(1, Ordering::Relaxed);
                Some(record)
            }
            _ => None,
        }
    }

    /// Current number of pending records.
    pub fn size(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
