//! Batch processor pump.
//!
//! A single task drains the segment ring into a growing batch and seals
//! it on one of three triggers:
//!
//! - the batch reached its size limit ("complete batch"),
//! - the buffer pool ran dry ("pool pressure"); buffers must get back
//!   to the receivers quickly,
//! - the idle timer fired with data pending ("partial batch").
//!
//! Sealing copies every payload into an owned string, returns the
//! buffers, and pushes the document vector onto the bounded batch queue.
//! A full batch queue displaces its oldest batch, mirroring the ring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use xrelay_protocol::{BufferPool, Segment, SegmentRing, SpillQueue};
use xrelay_telemetry::TelemetryState;

/// Batch processor tuning.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Segments per sealed batch.
    pub batch_size: usize,

    /// Idle time before a partial batch is sealed.
    pub idle_timeout: Duration,

    /// Sealed batches buffered ahead of the uploader workers.
    pub queue_size: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            idle_timeout: Duration::from_secs(1),
            queue_size: 20,
        }
    }
}

/// The pump between the segment ring and the uploader workers.
pub struct BatchProcessor {
    config: ProcessorConfig,
    ring: Arc<SegmentRing>,
    pool: Arc<BufferPool>,
    batches: Arc<SpillQueue<Vec<String>>>,
    telemetry: Arc<TelemetryState>,
}

impl BatchProcessor {
    /// Create the pump. Batch size is capped at the pool size so a batch
    /// can never pin more buffers than exist.
    pub fn new(
        config: ProcessorConfig,
        ring: Arc<SegmentRing>,
        pool: Arc<BufferPool>,
        batches: Arc<SpillQueue<Vec<String>>>,
        telemetry: Arc<TelemetryState>,
    ) -> Self {
        let mut config = config;
        config.batch_size = config.batch_size.min(pool.capacity()).max(1);
        tracing::debug!(batch_size = config.batch_size, "batch processor configured");
        Self {
            config,
            ring,
            pool,
            batches,
            telemetry,
        }
    }

    /// Drain the ring until it is closed and empty, then seal the
    /// remainder and close the batch queue.
    pub async fn run(self) {
        let mut batch: Vec<Segment> = Vec::with_capacity(self.config.batch_size);

        let idle = tokio::time::sleep(self.config.idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                segment = self.ring.pop() => {
                    let Some(segment) = segment else { break };
                    batch.push(segment);

                    if batch.len() >= self.config.batch_size {
                        tracing::debug!("sealing complete batch");
                        self.seal(&mut batch);
                        idle.as_mut().reset(Instant::now() + self.config.idle_timeout);
                    } else if self.pool.available() == 0 {
                        tracing::debug!("sealing partial batch due to pool pressure");
                        self.seal(&mut batch);
                        idle.as_mut().reset(Instant::now() + self.config.idle_timeout);
                    }
                }
                _ = idle.as_mut() => {
                    if !batch.is_empty() {
                        tracing::debug!("sealing partial batch on idle timeout");
                        self.seal(&mut batch);
                    }
                    idle.as_mut().reset(Instant::now() + self.config.idle_timeout);
                }
            }
        }

        if !batch.is_empty() {
            self.seal(&mut batch);
        }
        self.batches.close();
        tracing::debug!("batch processor done");
    }

    /// Copy payloads out, return buffers, and enqueue the batch with
    /// displace-oldest overflow.
    fn seal(&self, batch: &mut Vec<Segment>) {
        let mut documents = Vec::with_capacity(batch.len());
        for segment in batch.drain(..) {
            documents.push(segment.body_string());
            self.pool.release(segment.into_buf());
        }

        match self.batches.push(documents) {
            Ok(Some(displaced)) => {
                self.telemetry.segment_spilled(displaced.len() as u64);
                tracing::warn!(count = displaced.len(), "spilling over segments, batch queue full");
            }
            Ok(None) => {}
            Err(_) => {
                // Sealing happens before the queue closes; nothing to do
                // beyond noting the bug.
                tracing::error!("batch queue closed before processor finished");
            }
        }
    }
}

#[cfg(test)]
#[path = "processor_test.rs"]
mod processor_test;
