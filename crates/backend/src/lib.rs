//! X-Ray backend access for the xrelay daemon.
//!
//! Everything that talks to AWS lives here:
//!
//! - endpoint construction from region and partition (`endpoint`)
//! - region discovery and the credential chain (`auth`)
//! - the SigV4 signing helper shared with the proxy (`sign`)
//! - the thin client facade over the service API (`client`): one call for
//!   segment batches, one for telemetry records
//! - the connection error taxonomy the telemetry counters key on (`error`)
//!
//! The facade is a trait so the pipeline and telemetry uploader can be
//! tested against a mock without a network.

mod auth;
mod client;
mod endpoint;
mod error;
mod sign;
mod types;

pub use auth::{build_credentials, resolve_region};
pub use client::{ClientSettings, XRayApi, XRayClient};
pub use endpoint::resolve_endpoint;
pub use error::{BackendError, ErrorClass};
pub use sign::{payload_hash, sign_request};
pub use types::{
    BackendConnectionErrors, PutSegmentsOutput, TelemetryMeta, TelemetryRecord, UnprocessedSegment,
};
