//! Wire types for the two service calls.
//!
//! Field names follow the service's JSON shapes exactly; everything else
//! in the daemon uses these structs rather than raw JSON values.

use serde::{Deserialize, Serialize};

/// One segment the service refused from a batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnprocessedSegment {
    /// Segment id, when the service could determine one.
    #[serde(rename = "Id")]
    pub id: Option<String>,

    /// Service error code.
    #[serde(rename = "ErrorCode")]
    pub error_code: Option<String>,

    /// Human-readable rejection reason.
    #[serde(rename = "Message")]
    pub message: Option<String>,
}

/// Response of a segment batch upload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PutSegmentsOutput {
    /// Segments the service did not accept; the rest were stored.
    #[serde(rename = "UnprocessedTraceSegments", default)]
    pub unprocessed: Vec<UnprocessedSegment>,
}

/// Backend connection failures counted over one telemetry window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConnectionErrors {
    #[serde(rename = "TimeoutCount")]
    pub timeout_count: u64,

    #[serde(rename = "ConnectionRefusedCount")]
    pub connection_refused_count: u64,

    #[serde(rename = "HTTPCode4XXCount")]
    pub http_code_4xx_count: u64,

    #[serde(rename = "HTTPCode5XXCount")]
    pub http_code_5xx_count: u64,

    #[serde(rename = "UnknownHostCount")]
    pub unknown_host_count: u64,

    #[serde(rename = "OtherCount")]
    pub other_count: u64,
}

/// One telemetry window snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Window close time, seconds since the epoch.
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,

    #[serde(rename = "SegmentsReceivedCount")]
    pub segments_received_count: u64,

    #[serde(rename = "SegmentsSentCount")]
    pub segments_sent_count: u64,

    #[serde(rename = "SegmentsSpilloverCount")]
    pub segments_spillover_count: u64,

    #[serde(rename = "SegmentsRejectedCount")]
    pub segments_rejected_count: u64,

    #[serde(rename = "BackendConnectionErrors")]
    pub backend_connection_errors: BackendConnectionErrors,
}

/// Identity fields sent alongside telemetry records.
#[derive(Debug, Clone, Default)]
pub struct TelemetryMeta {
    /// EC2 instance id, empty when unavailable.
    pub instance_id: String,

    /// Host name, empty when unavailable.
    pub hostname: String,

    /// ARN of the resource running the daemon, empty when unset.
    pub resource_arn: String,
}
