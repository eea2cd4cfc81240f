//! Uploader worker pool.
//!
//! Workers consume sealed batches and call the backend. Failures are
//! classified into the telemetry counters and answered with full-jitter
//! backoff; segments the service individually refused are counted as
//! rejected and logged with their extracted ids, but never retried.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use xrelay_backend::{UnprocessedSegment, XRayApi};
use xrelay_protocol::{segment_id, trace_id, SpillQueue};
use xrelay_telemetry::TelemetryState;

use crate::backoff;

/// Pool of upload workers over one shared batch queue.
pub struct UploaderPool {
    concurrency: usize,
    client: Arc<dyn XRayApi>,
    telemetry: Arc<TelemetryState>,
}

impl UploaderPool {
    /// Create a pool of `concurrency` workers.
    pub fn new(
        concurrency: usize,
        client: Arc<dyn XRayApi>,
        telemetry: Arc<TelemetryState>,
    ) -> Self {
        Self {
            concurrency,
            client,
            telemetry,
        }
    }

    /// Spawn the workers. Each exits when the queue is closed and empty;
    /// `cancel` cuts backoff sleeps short so shutdown drains promptly.
    pub fn spawn(
        &self,
        batches: Arc<SpillQueue<Vec<String>>>,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        (0..self.concurrency)
            .map(|worker_id| {
                let worker = UploadWorker {
                    id: worker_id,
                    batches: Arc::clone(&batches),
                    client: Arc::clone(&self.client),
                    telemetry: Arc::clone(&self.telemetry),
                    cancel: cancel.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect()
    }
}

struct UploadWorker {
    id: usize,
    batches: Arc<SpillQueue<Vec<String>>>,
    client: Arc<dyn XRayApi>,
    telemetry: Arc<TelemetryState>,
    cancel: CancellationToken,
}

impl UploadWorker {
    async fn run(self) {
        let mut failed_attempts: u64 = 0;

        while let Some(batch) = self.batches.pop().await {
            let start = Instant::now();
            match self.client.put_segments(batch.clone()).await {
                Ok(output) => {
                    self.telemetry.segment_sent(batch.len() as u64);
                    if output.unprocessed.is_empty() {
                        failed_attempts = 0;
                        tracing::info!(
                            worker_id = self.id,
                            count = batch.len(),
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "sent segment batch"
                        );
                    } else {
                        tracing::info!(
                            worker_id = self.id,
                            count = batch.len(),
                            unprocessed = output.unprocessed.len(),
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "sent segment batch with unprocessed segments"
                        );
                        self.report_unprocessed(&batch, &output.unprocessed);
                    }
                }
                Err(err) => {
                    self.telemetry.backend_error(err.classify());
                    failed_attempts += 1;
                    tracing::error!(
                        worker_id = self.id,
                        error = %err,
                        failed_attempts,
                        "sending segment batch failed"
                    );

                    let delay = backoff::jittered_delay(failed_attempts);
                    if !delay.is_zero() {
                        tracing::debug!(
                            worker_id = self.id,
                            delay_ms = delay.as_millis() as u64,
                            "backing off before next batch"
                        );
                        tokio::select! {
                            _ = self.cancel.cancelled() => {}
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        tracing::debug!(worker_id = self.id, "upload worker done");
    }

    /// Count and log segments the service refused. Best-effort id
    /// extraction; a document we cannot match is logged raw.
    fn report_unprocessed(&self, batch: &[String], unprocessed: &[UnprocessedSegment]) {
        let mut by_id: HashMap<&str, &String> = HashMap::with_capacity(batch.len());
        for document in batch {
            match segment_id(document) {
                Some(id) => {
                    by_id.insert(id, document);
                }
                None => {
                    tracing::debug!(worker_id = self.id, document = %document, "failed to match id in segment");
                }
            }
        }

        for item in unprocessed {
            self.telemetry.segment_rejected(1);

            let Some(id) = item.id.as_deref() else {
                tracing::debug!(
                    worker_id = self.id,
                    error_code = item.error_code.as_deref().unwrap_or(""),
                    "unprocessed segment without id from service"
                );
                continue;
            };

            match by_id.get(id).and_then(|document| trace_id(document)) {
                Some(trace) => tracing::error!(
                    worker_id = self.id,
                    trace_id = %trace,
                    segment_id = %id,
                    error_code = item.error_code.as_deref().unwrap_or(""),
                    "unprocessed segment"
                ),
                None => tracing::error!(
                    worker_id = self.id,
                    segment_id = %id,
                    error_code = item.error_code.as_deref().unwrap_or(""),
                    "unprocessed segment"
                ),
            }
            if let Some(document) = by_id.get(id) {
                tracing::debug!(worker_id = self.id, document = %document, "unprocessed segment document");
            }
        }
    }
}

#[cfg(test)]
#[path = "uploader_test.rs"]
mod uploader_test;
