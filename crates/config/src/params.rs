//! Pipeline tuning parameters.
//!
//! These rarely need changing and are deliberately not part of the main
//! config file surface; the daemon constructs one and adjusts the few
//! values that depend on runtime facts (batch size is capped at the pool
//! size so a batch can never pin more buffers than exist).

/// Tuning knobs for the receive and upload pipeline.
#[derive(Debug, Clone)]
pub struct ParameterConfig {
    /// Concurrent receiver tasks reading the UDP socket.
    pub receiver_routines: usize,

    /// Receive buffer size per datagram, in KB.
    pub socket_buffer_kb: usize,

    /// Segments per upload batch.
    pub batch_size: usize,

    /// Idle time before a partial batch is sealed, in milliseconds.
    pub idle_timeout_ms: u64,

    /// Idle connections kept per backend host.
    pub max_idle_conn_per_host: usize,

    /// Per-request timeout for backend calls, in seconds.
    pub request_timeout_s: u64,

    /// Sealed batches buffered ahead of the uploader workers.
    pub batch_processor_queue_size: usize,

    /// Floor for the segment ring capacity.
    pub segment_channel_std: usize,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            receiver_routines: 2,
            socket_buffer_kb: 64,
            batch_size: 50,
            idle_timeout_ms: 1000,
            max_idle_conn_per_host: 8,
            request_timeout_s: 2,
            batch_processor_queue_size: 20,
            segment_channel_std: 250,
        }
    }
}

impl ParameterConfig {
    /// Receive buffer size in bytes.
    pub fn socket_buffer_size(&self) -> usize {
        self.socket_buffer_kb * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = ParameterConfig::default();
        assert_eq!(params.receiver_routines, 2);
        assert_eq!(params.socket_buffer_kb, 64);
        assert_eq!(params.socket_buffer_size(), 65536);
        assert_eq!(params.batch_size, 50);
        assert_eq!(params.idle_timeout_ms, 1000);
        assert_eq!(params.max_idle_conn_per_host, 8);
        assert_eq!(params.request_timeout_s, 2);
        assert_eq!(params.batch_processor_queue_size, 20);
        assert_eq!(params.segment_channel_std, 250);
    }
}
