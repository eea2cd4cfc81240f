//! Batching and upload pipeline.
//!
//! One pump task drains the segment ring into batches and seals them on
//! size, pool pressure, or idle timeout; a pool of uploader workers ships
//! sealed batches to the backend with jittered backoff on failure.
//!
//! [`Pipeline::run`] owns the whole lifecycle: it spawns the workers,
//! runs the pump to completion (ring closed and drained), closes the
//! batch queue, and waits for every worker to finish, so by the time it
//! returns, every accepted segment has either been handed to the backend
//! or counted as lost.

mod backoff;
mod processor;
mod uploader;

pub use backoff::{jittered_delay, max_delay};
pub use processor::{BatchProcessor, ProcessorConfig};
pub use uploader::UploaderPool;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use xrelay_backend::XRayApi;
use xrelay_protocol::{BufferPool, SegmentRing, SpillQueue};
use xrelay_telemetry::TelemetryState;

/// The assembled pipeline: pump plus uploader workers.
pub struct Pipeline {
    processor: BatchProcessor,
    uploaders: UploaderPool,
    batches: Arc<SpillQueue<Vec<String>>>,
}

impl Pipeline {
    /// Wire up a pipeline over the shared ring, pool and backend client.
    pub fn new(
        config: ProcessorConfig,
        concurrency: usize,
        ring: Arc<SegmentRing>,
        pool: Arc<BufferPool>,
        client: Arc<dyn XRayApi>,
        telemetry: Arc<TelemetryState>,
    ) -> Self {
        let batches = Arc::new(SpillQueue::new(config.queue_size));
        let processor = BatchProcessor::new(
            config,
            ring,
            pool,
            Arc::clone(&batches),
            Arc::clone(&telemetry),
        );
        let uploaders = UploaderPool::new(concurrency, client, telemetry);
        Self {
            processor,
            uploaders,
            batches,
        }
    }

    /// Run until the ring is closed and everything in flight has been
    /// attempted. `cancel` only shortens backoff sleeps; draining itself
    /// is not cancellable.
    pub async fn run(self, cancel: CancellationToken) {
        let workers = self.uploaders.spawn(Arc::clone(&self.batches), cancel);

        self.processor.run().await;

        for worker in workers {
            let _ = worker.await;
        }
        tracing::debug!("pipeline done");
    }
}
