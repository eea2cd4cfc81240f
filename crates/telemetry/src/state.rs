//! Shared telemetry counters.
//!
//! Hot-path components only ever fetch-add; the uploader rotates the
//! window by swapping each counter to zero. A fetch-add racing the
//! rotation lands in exactly one of the two windows, which is the
//! contract the record format needs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use xrelay_backend::{BackendConnectionErrors, ErrorClass, TelemetryRecord};

/// Live counter set shared across the daemon.
#[derive(Debug, Default)]
pub struct TelemetryState {
    segments_received: AtomicU64,
    segments_sent: AtomicU64,
    segments_rejected: AtomicU64,
    segments_spilled: AtomicU64,

    err_timeout: AtomicU64,
    err_refused: AtomicU64,
    err_4xx: AtomicU64,
    err_5xx: AtomicU64,
    err_unknown_host: AtomicU64,
    err_other: AtomicU64,

    /// Set once the first segment arrives; gates all uploads.
    post_enabled: AtomicBool,
}

impl TelemetryState {
    /// Create a zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count datagrams read off the socket. Arms telemetry posting.
    pub fn segment_received(&self, count: u64) {
        self.segments_received.fetch_add(count, Ordering::Relaxed);
        self.post_enabled.store(true, Ordering::Relaxed);
    }

    /// Count segments accepted by the service.
    pub fn segment_sent(&self, count: u64) {
        self.segments_sent.fetch_add(count, Ordering::Relaxed);
    }

    /// Count segments dropped for being malformed or refused.
    pub fn segment_rejected(&self, count: u64) {
        self.segments_rejected.fetch_add(count, Ordering::Relaxed);
    }

    /// Count segments lost because ingress outran egress.
    pub fn segment_spilled(&self, count: u64) {
        self.segments_spilled.fetch_add(count, Ordering::Relaxed);
    }

    /// Count a classified backend connection failure.
    pub fn backend_error(&self, class: ErrorClass) {
        let counter = match class {
            ErrorClass::Timeout => &self.err_timeout,
            ErrorClass::Refused => &self.err_refused,
            ErrorClass::Http4xx(_) => &self.err_4xx,
            ErrorClass::Http5xx(_) => &self.err_5xx,
            ErrorClass::UnknownHost => &self.err_unknown_host,
            ErrorClass::Other => &self.err_other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether any segment has ever been received.
    pub fn post_enabled(&self) -> bool {
        self.post_enabled.load(Ordering::Relaxed)
    }

    /// Close the current window: zero every counter and return the
    /// snapshot stamped with `timestamp`.
    pub fn rotate(&self, timestamp: i64) -> TelemetryRecord {
        TelemetryRecord {
            timestamp,
            segments_received_count: self.segments_received.swap(0, Ordering::Relaxed),
            segments_sent_count: self.segments_sent.swap(0, Ordering::Relaxed),
            segments_rejected_count: self.segments_rejected.swap(0, Ordering::Relaxed),
            segments_spillover_count: self.segments_spilled.swap(0, Ordering::Relaxed),
            backend_connection_errors: BackendConnectionErrors {
                timeout_count: self.err_timeout.swap(0, Ordering::Relaxed),
                connection_refused_count: self.err_refused.swap(0, Ordering::Relaxed),
                http_code_4xx_count: self.err_4xx.swap(0, Ordering::Relaxed),
                http_code_5xx_count: self.err_5xx.swap(0, Ordering::Relaxed),
                unknown_host_count: self.err_unknown_host.swap(0, Ordering::Relaxed),
                other_count: self.err_other.swap(0, Ordering::Relaxed),
            },
        }
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;
