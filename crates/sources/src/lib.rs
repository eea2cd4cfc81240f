//! Segment ingestion sources for the xrelay daemon.
//!
//! One source today: framed segment documents over UDP.

mod udp;

pub use udp::{UdpSource, UdpSourceConfig, UdpSourceError};
