//! Segment ring.
//!
//! The bounded queue between the UDP receivers and the batch processor.
//! Producers never block: when the ring is full the oldest segment is
//! dropped, its buffer goes straight back to the pool, and a truncation
//! counter records the loss. Capacity is `max(floor, pool size)`, sized
//! to the pool because segments are dropped anyway once no buffer can be
//! acquired; the floor keeps small pools from starving the queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::buffer_pool::BufferPool;
use crate::segment::Segment;
use crate::spill_queue::SpillQueue;

/// Outcome of a successful [`SegmentRing::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The segment was stored without loss.
    Stored,
    /// The ring was full; the oldest segment was dropped to make room.
    Displaced,
}

/// Bounded drop-oldest FIFO of segments awaiting batching.
pub struct SegmentRing {
    queue: SpillQueue<Segment>,
    pool: Arc<BufferPool>,
    truncated: AtomicU64,
}

impl SegmentRing {
    /// Create a ring sized for `buffer_count` pool buffers, with a
    /// minimum capacity of `floor`.
    pub fn new(buffer_count: usize, floor: usize, pool: Arc<BufferPool>) -> Self {
        Self {
            queue: SpillQueue::new(buffer_count.max(floor)),
            pool,
            truncated: AtomicU64::new(0),
        }
    }

    /// Enqueue a segment, displacing the oldest one when full.
    ///
    /// A displaced segment has its buffer returned to the pool here; the
    /// caller is responsible for the spillover telemetry and logging.
    /// Pushing after close hands the segment back; the receivers must be
    /// stopped before the ring is closed.
    pub fn push(&self, segment: Segment) -> Result<PushOutcome, Segment> {
        match self.queue.push(segment) {
            Ok(Some(displaced)) => {
                self.truncated.fetch_add(1, Ordering::Relaxed);
                self.pool.release(displaced.into_buf());
                Ok(PushOutcome::Displaced)
            }
            Ok(None) => Ok(PushOutcome::Stored),
            Err(err) => Err(err.0),
        }
    }

    /// Dequeue the oldest segment; `None` once closed and drained.
    pub async fn pop(&self) -> Option<Segment> {
        self.queue.pop().await
    }

    /// Close the ring. Idempotent.
    pub fn close(&self) {
        self.queue.close();
    }

    /// Monotonic count of segments dropped by displacement.
    pub fn truncated_count(&self) -> u64 {
        self.truncated.load(Ordering::Relaxed)
    }

    /// Segments currently queued.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the ring is empty at this instant.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Ring capacity.
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

#[cfg(test)]
#[path = "ring_test.rs"]
mod ring_test;
