//! Bounded drop-oldest queue.
//!
//! The daemon prefers losing the *oldest* buffered work to blocking its
//! producers: ingestion must never stall on a slow backend. This queue is
//! used three times with different element types: segments on the ring,
//! sealed batches in front of the uploader workers, and telemetry records
//! awaiting upload.
//!
//! `push` never blocks. When the queue is full the oldest element is
//! evicted and handed back to the caller, which owns the side effects
//! (returning a buffer, counting spillover, logging). `pop` is the only
//! suspending operation and resolves to `None` exactly when the queue is
//! closed and drained.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Error returned when pushing onto a closed queue. Carries the rejected
/// element back so the caller can dispose of it.
#[derive(Debug)]
pub struct SendError<T>(pub T);

impl<T> std::fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "queue is closed")
    }
}

impl<T: std::fmt::Debug> std::error::Error for SendError<T> {}

struct QueueInner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded multi-producer multi-consumer FIFO with drop-oldest overflow.
pub struct SpillQueue<T> {
    inner: Mutex<QueueInner<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T> SpillQueue<T> {
    /// Create a queue bounded at `capacity` elements. A zero capacity is a
    /// construction bug and panics.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "spill queue capacity must be non-zero");
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueue an element without blocking.
    ///
    /// Returns the evicted oldest element when the queue was full, `None`
    /// when there was room. Pushing onto a closed queue is a caller
    /// sequencing bug and returns the element back as an error.
    pub fn push(&self, item: T) -> Result<Option<T>, SendError<T>> {
        let evicted = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(SendError(item));
            }
            let evicted = if inner.items.len() == self.capacity {
                inner.items.pop_front()
            } else {
                None
            };
            inner.items.push_back(item);
            evicted
        };
        self.notify.notify_one();
        Ok(evicted)
    }

    /// Dequeue the oldest element, waiting while the queue is empty.
    ///
    /// Returns `None` only when the queue is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            // Register interest before re-checking so a push between the
            // check and the await cannot be missed.
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock();
                if let Some(item) = inner.items.pop_front() {
                    // Hand the permit on; another consumer may have work.
                    if !inner.items.is_empty() {
                        self.notify.notify_one();
                    }
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Dequeue without waiting. `None` means empty right now.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().items.pop_front()
    }

    /// Close the queue. Idempotent; wakes every waiting consumer so they
    /// can observe closed-and-empty.
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            inner.closed = true;
        }
        self.notify.notify_waiters();
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of queued elements at this instant.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the queue is empty at this instant.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Maximum number of queued elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
#[path = "spill_queue_test.rs"]
mod spill_queue_test;
