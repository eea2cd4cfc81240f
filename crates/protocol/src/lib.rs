//! Wire format and buffer primitives for the xrelay daemon.
//!
//! This crate holds everything the ingestion and delivery pipeline agree on:
//!
//! - The datagram framing header (`header`)
//! - The fixed-capacity receive buffer pool (`buffer_pool`)
//! - The bounded drop-oldest queue used for segments, batches and
//!   telemetry records (`spill_queue`)
//! - The segment handle and the segment ring built on top of both
//!   (`segment`, `ring`)
//! - Best-effort id extraction for diagnostics (`ids`)
//!
//! Nothing in here touches the network or AWS; higher crates compose these
//! pieces into the daemon.

mod buffer_pool;
mod header;
mod ids;
mod ring;
mod segment;
mod spill_queue;

pub use buffer_pool::{BufferPool, PooledBuf};
pub use header::{split_header_body, Header};
pub use ids::{segment_id, trace_id};
pub use ring::{PushOutcome, SegmentRing};
pub use segment::Segment;
pub use spill_queue::{SendError, SpillQueue};
