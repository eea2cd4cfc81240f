//! Buffer memory sizing.
//!
//! The pool's buffer count is derived from a memory budget: either the
//! configured limit or 1% of host memory when unset. Below 3 MB the pool
//! would be too small to absorb a single burst, so startup refuses it.

use crate::error::{ConfigError, Result};

/// Smallest accepted buffer memory limit in MB.
pub const MIN_BUFFER_MEMORY_MB: u64 = 3;

/// Share of host memory used when no limit is configured.
const DEFAULT_MEMORY_FRACTION: f64 = 0.01;

/// Resolve the effective buffer memory limit in MB.
///
/// `configured_mb` of 0 means unset; `total_host_mb` is the machine's
/// physical memory. Fails when the result lands below the minimum.
pub fn effective_memory_limit_mb(configured_mb: u64, total_host_mb: u64) -> Result<u64> {
    let limit = if configured_mb > 0 {
        configured_mb
    } else {
        (DEFAULT_MEMORY_FRACTION * total_host_mb as f64).floor() as u64
    };

    if limit < MIN_BUFFER_MEMORY_MB {
        return Err(ConfigError::InsufficientMemory {
            minimum: MIN_BUFFER_MEMORY_MB,
        });
    }
    Ok(limit)
}

/// Number of receive buffers of `buffer_size` bytes that fit in
/// `limit_mb` megabytes.
pub fn pool_buffer_count(limit_mb: u64, buffer_size: usize) -> Result<usize> {
    if buffer_size == 0 {
        return Err(ConfigError::invalid_value(
            "Socket.BufferSizeKB",
            "receive buffer size must be positive",
        ));
    }
    if limit_mb == 0 {
        return Err(ConfigError::invalid_value(
            "TotalBufferSizeMB",
            "buffer memory limit must be positive",
        ));
    }
    Ok((limit_mb as usize * 1024 * 1024) / buffer_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_limit_wins() {
        assert_eq!(effective_memory_limit_mb(64, 8192).unwrap(), 64);
    }

    #[test]
    fn test_unset_uses_one_percent_of_host() {
        assert_eq!(effective_memory_limit_mb(0, 16384).unwrap(), 163);
    }

    #[test]
    fn test_below_minimum_rejected() {
        assert!(effective_memory_limit_mb(2, 8192).is_err());
        // 1% of 256MB rounds down to 2MB.
        assert!(effective_memory_limit_mb(0, 256).is_err());
    }

    #[test]
    fn test_minimum_accepted() {
        assert_eq!(effective_memory_limit_mb(3, 8192).unwrap(), 3);
    }

    #[test]
    fn test_pool_buffer_count() {
        // 3MB of 64KB buffers.
        assert_eq!(pool_buffer_count(3, 64 * 1024).unwrap(), 48);
        // 16MB of 64KB buffers.
        assert_eq!(pool_buffer_count(16, 64 * 1024).unwrap(), 256);
    }

    #[test]
    fn test_pool_buffer_count_invalid_inputs() {
        assert!(pool_buffer_count(0, 64 * 1024).is_err());
        assert!(pool_buffer_count(3, 0).is_err());
    }
}
