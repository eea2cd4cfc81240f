//! Signing HTTP reverse proxy.
//!
//! Co-located SDKs call the service API through this server instead of
//! holding credentials themselves. Any method and path is accepted; the
//! request is re-addressed to the resolved service endpoint, SigV4-signed
//! with the daemon's credentials, forwarded, and the upstream response is
//! relayed back unmodified.
//!
//! Failure policy mirrors the rest of the daemon's best-effort posture:
//! when credentials or signing fail the request is forwarded *unsigned*
//! and the upstream's rejection speaks for itself.

mod server;

pub use server::{ProxyConfig, ProxyError, ProxyServer};
