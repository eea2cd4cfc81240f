//! Telemetry uploader task.
//!
//! Rotates the live counter window every 60 seconds, buffers the closed
//! records (drop-oldest, bounded), and ships them in chunks through the
//! shared backend client. On shutdown it performs one final rotation and
//! flush before signalling done.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use xrelay_backend::{TelemetryMeta, TelemetryRecord, XRayApi};
use xrelay_protocol::SpillQueue;

use crate::state::TelemetryState;

/// Window length between rotations.
const CUTOFF_INTERVAL: Duration = Duration::from_secs(60);

/// Closed records retained while the backend is unreachable.
const BUFFER_SIZE: usize = 30;

/// Records per upload request.
const REQUEST_SIZE: usize = 10;

/// Uploader construction parameters.
pub struct UploaderConfig {
    /// Identity fields attached to every request.
    pub meta: TelemetryMeta,

    /// Window length override, for tests. `None` uses 60 s.
    pub interval: Option<Duration>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            meta: TelemetryMeta::default(),
            interval: None,
        }
    }
}

/// Periodic telemetry uploader.
pub struct TelemetryUploader {
    state: Arc<TelemetryState>,
    client: Arc<dyn XRayApi>,
    meta: TelemetryMeta,
    interval: Duration,
    buffer: SpillQueue<TelemetryRecord>,
}

impl TelemetryUploader {
    /// Create an uploader over the shared state and backend client.
    pub fn new(
        state: Arc<TelemetryState>,
        client: Arc<dyn XRayApi>,
        config: UploaderConfig,
    ) -> Self {
        Self {
            state,
            client,
            meta: config.meta,
            interval: config.interval.unwrap_or(CUTOFF_INTERVAL),
            buffer: SpillQueue::new(BUFFER_SIZE),
        }
    }

    /// Run until cancelled. The final window is flushed before returning.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::debug!(interval_secs = self.interval.as_secs(), "telemetry uploader started");

        loop {
            let quit = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(self.interval) => false,
            };

            self.rotate_into_buffer();
            self.send_all().await;

            if quit {
                self.buffer.close();
                tracing::debug!("telemetry uploader done");
                return;
            }
        }
    }

    /// Close the current window and queue the record, oldest-first
    /// truncation when the buffer is full.
    fn rotate_into_buffer(&self) {
        let record = self.state.rotate(chrono::Utc::now().timestamp());

        if !self.state.post_enabled() {
            tracing::debug!("skipped telemetry record, no segments received yet");
            return;
        }

        match self.buffer.push(record) {
            Ok(Some(_)) => tracing::debug!("telemetry buffer full, dropped oldest record"),
            Ok(None) => {}
            Err(_) => tracing::debug!("telemetry buffer closed, dropping record"),
        }
    }

    /// Drain the buffer and upload in chunks. Unsent records are
    /// re-queued for the next window.
    async fn send_all(&self) {
        let mut records = Vec::with_capacity(BUFFER_SIZE);
        while let Some(record) = self.buffer.try_pop() {
            records.push(record);
        }
        if records.is_empty() {
            return;
        }

        let total = records.len();
        let mut sent = 0;
        while sent < total {
            let end = (sent + REQUEST_SIZE).min(total);
            let chunk = records[sent..end].to_vec();
            match self.client.put_telemetry(chunk, &self.meta).await {
                Ok(()) => sent = end,
                Err(err) => {
                    self.state.backend_error(err.classify());
                    tracing::debug!(
                        unsent = total - sent,
                        error = %err,
                        "failed to send telemetry records, re-queueing"
                    );
                    for record in records.drain(sent..) {
                        if self.buffer.push(record).is_err() {
                            break;
                        }
                    }
                    return;
                }
            }
        }
        tracing::debug!(count = total, "sent telemetry records");
    }
}

#[cfg(test)]
#[path = "uploader_test.rs"]
mod uploader_test;
