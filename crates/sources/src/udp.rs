//! UDP segment source.
//!
//! Receives framed segment documents over UDP and feeds the segment ring.
//!
//! # Design
//!
//! UDP is connectionless, so ingestion scales by workers rather than
//! connections:
//!
//! - Multiple workers each own a socket bound to the same address
//!   (`SO_REUSEPORT`); the kernel load-balances datagrams across them.
//! - Each worker reads into a buffer loaned from the shared pool. When
//!   the pool is empty the datagram is still read, into a worker-local
//!   scratch buffer, and then dropped, so the received/spillover
//!   counters reflect the loss. This is the only backpressure valve at
//!   ingest; nothing on this path ever blocks on the uploader.
//! - Framing is validated here; the body stays untouched bytes until the
//!   batch processor copies it out.
//!
//! Ordering is strict within one worker and unspecified across workers.

use std::net::SocketAddr;
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use xrelay_protocol::{split_header_body, BufferPool, Header, PushOutcome, Segment, SegmentRing};
use xrelay_telemetry::TelemetryState;

/// OS receive buffer multiplier over the datagram size, to absorb bursts.
const SOCKET_BUFFER_MULTIPLIER: usize = 4;

/// UDP source configuration.
#[derive(Debug, Clone)]
pub struct UdpSourceConfig {
    /// Bind address, e.g. "127.0.0.1:2000".
    pub address: String,

    /// Number of receiver workers sharing the port.
    pub routines: usize,

    /// Receive size per datagram; matches the pool's buffer size.
    pub buffer_size: usize,
}

impl Default for UdpSourceConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:2000".into(),
            routines: 2,
            buffer_size: 64 * 1024,
        }
    }
}

/// UDP source errors.
#[derive(Debug, thiserror::Error)]
pub enum UdpSourceError {
    /// The bind address did not parse.
    #[error("invalid UDP bind address '{address}'")]
    Address {
        /// The offending address string.
        address: String,
    },

    /// Failed to bind a worker socket.
    #[error("failed to bind UDP socket on {address}: {source}")]
    Bind {
        /// Bind address.
        address: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Multi-worker UDP segment source.
pub struct UdpSource {
    config: UdpSourceConfig,
    pool: Arc<BufferPool>,
    ring: Arc<SegmentRing>,
    telemetry: Arc<TelemetryState>,
}

impl UdpSource {
    /// Create a source feeding `ring` from buffers in `pool`.
    pub fn new(
        config: UdpSourceConfig,
        pool: Arc<BufferPool>,
        ring: Arc<SegmentRing>,
        telemetry: Arc<TelemetryState>,
    ) -> Self {
        Self {
            config,
            pool,
            ring,
            telemetry,
        }
    }

    /// Bind the worker sockets and run until cancelled.
    ///
    /// Returns once every worker has exited; the caller closes the ring
    /// afterwards so the processor can drain.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), UdpSourceError> {
        let addr: SocketAddr =
            self.config
                .address
                .parse()
                .map_err(|_| UdpSourceError::Address {
                    address: self.config.address.clone(),
                })?;

        let mut handles = Vec::with_capacity(self.config.routines);
        for worker_id in 0..self.config.routines {
            let socket = self
                .bind_socket(addr)
                .map_err(|e| UdpSourceError::Bind {
                    address: self.config.address.clone(),
                    source: e,
                })?;

            let worker = UdpWorker {
                id: worker_id,
                socket,
                pool: Arc::clone(&self.pool),
                ring: Arc::clone(&self.ring),
                telemetry: Arc::clone(&self.telemetry),
                scratch: vec![0u8; self.config.buffer_size],
                cancel: cancel.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        tracing::info!(
            address = %self.config.address,
            workers = self.config.routines,
            "UDP source listening"
        );

        for handle in handles {
            let _ = handle.await;
        }

        tracing::info!(address = %self.config.address, "UDP source stopped");
        Ok(())
    }

    /// Build a worker socket with `SO_REUSEPORT` so all workers share the
    /// bound address and the kernel distributes datagrams.
    fn bind_socket(&self, addr: SocketAddr) -> std::io::Result<UdpSocket> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;

        let recv_buffer = self.config.buffer_size * SOCKET_BUFFER_MULTIPLIER;
        if let Err(e) = socket.set_recv_buffer_size(recv_buffer) {
            tracing::warn!(error = %e, requested = recv_buffer, "failed to set UDP SO_RCVBUF");
        }

        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;
        UdpSocket::from_std(socket.into())
    }
}

/// One receiver worker with its own socket and scratch buffer.
struct UdpWorker {
    id: usize,
    socket: UdpSocket,
    pool: Arc<BufferPool>,
    ring: Arc<SegmentRing>,
    telemetry: Arc<TelemetryState>,
    /// Used to read (and drop) datagrams when the pool is exhausted.
    scratch: Vec<u8>,
    cancel: CancellationToken,
}

impl UdpWorker {
    async fn run(mut self) {
        tracing::debug!(worker_id = self.id, "UDP worker started");

        loop {
            let mut lease = self.pool.acquire();
            if lease.is_none() {
                tracing::debug!(worker_id = self.id, "buffer pool empty, reading into scratch");
            }

            let received = {
                let target: &mut [u8] = match lease.as_mut() {
                    Some(buf) => buf.as_mut_slice(),
                    None => &mut self.scratch,
                };
                tokio::select! {
                    biased;

                    _ = self.cancel.cancelled() => None,
                    result = self.socket.recv_from(target) => Some(result),
                }
            };

            let Some(received) = received else {
                // Cancelled mid-receive; hand the loaned buffer back.
                if let Some(buf) = lease.take() {
                    self.pool.release(buf);
                }
                break;
            };

            let len = match received {
                Ok((len, _peer)) => len,
                Err(e) => {
                    tracing::error!(worker_id = self.id, error = %e, "UDP receive error");
                    if let Some(buf) = lease.take() {
                        self.pool.release(buf);
                    }
                    continue;
                }
            };

            if len > 0 {
                self.telemetry.segment_received(1);
            }

            if len == 0 {
                if let Some(buf) = lease.take() {
                    self.pool.release(buf);
                }
                continue;
            }

            let Some(buf) = lease.take() else {
                // Read happened on the scratch buffer; the datagram is
                // counted and dropped.
                self.telemetry.segment_spilled(1);
                tracing::warn!(
                    worker_id = self.id,
                    "segment dropped, consider increasing memory limit"
                );
                continue;
            };

            if !self.accept_datagram(buf, len) {
                break;
            }
        }

        tracing::debug!(worker_id = self.id, "UDP worker stopped");
    }

    /// Validate framing and push the segment onto the ring. Returns false
    /// when the worker should stop (ring closed under us).
    fn accept_datagram(&self, buf: xrelay_protocol::PooledBuf, len: usize) -> bool {
        let datagram = &buf.as_slice()[..len];

        let Some((raw_header, body)) = split_header_body(datagram) else {
            tracing::warn!(
                worker_id = self.id,
                "missing header separator, dropping datagram"
            );
            self.telemetry.segment_rejected(1);
            self.pool.release(buf);
            return true;
        };

        if body.is_empty() {
            tracing::warn!(worker_id = self.id, "missing segment body, dropping datagram");
            self.telemetry.segment_rejected(1);
            self.pool.release(buf);
            return true;
        }

        let valid = Header::parse(raw_header).is_some_and(|header| header.is_valid());
        if !valid {
            tracing::warn!(
                worker_id = self.id,
                header = %String::from_utf8_lossy(raw_header),
                "invalid header, dropping datagram"
            );
            self.telemetry.segment_rejected(1);
            self.pool.release(buf);
            return true;
        }

        let body_start = raw_header.len() + 1;
        let body_len = len - body_start;
        let segment = Segment::new(buf, body_start, body_len);

        match self.ring.push(segment) {
            Ok(PushOutcome::Stored) => true,
            Ok(PushOutcome::Displaced) => {
                self.telemetry.segment_spilled(1);
                tracing::warn!(
                    worker_id = self.id,
                    "segment ring full, dropped oldest segment document"
                );
                true
            }
            Err(rejected) => {
                // The ring is only closed after the receivers stop; landing
                // here is a shutdown sequencing bug.
                tracing::error!(worker_id = self.id, "segment ring closed, stopping worker");
                self.pool.release(rejected.into_buf());
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "udp_test.rs"]
mod udp_test;
