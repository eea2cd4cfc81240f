//! Daemon self-telemetry.
//!
//! Every component counts what it does (segments received, sent,
//! rejected, spilled, and backend connection failures) into one shared
//! [`TelemetryState`]. A dedicated uploader task closes a counter window
//! every 60 seconds and ships the snapshots to the backend alongside the
//! segment traffic.
//!
//! Until the first segment arrives nothing is uploaded: an idle daemon
//! has nothing interesting to report.

mod metadata;
mod state;
mod uploader;

pub use metadata::resolve_meta;
pub use state::TelemetryState;
pub use uploader::{TelemetryUploader, UploaderConfig};
