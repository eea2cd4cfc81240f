//! Fixed-capacity pool of receive buffers.
//!
//! All buffer memory the daemon will ever use for datagrams is allocated
//! up front; the pool hands buffers out on loan and takes them back after
//! the payload has been copied into its owned form. `available()` doubles
//! as the backpressure signal for the batch processor ("pool pressure").
//!
//! # Design
//!
//! - Every buffer carries the index it was allocated under; a loan bitmap
//!   tracks which indices are out, so a buffer that is not on loan is
//!   silently dropped on return instead of growing the pool.
//! - Free buffers are kept on a LIFO stack so the hottest buffer (most
//!   recently touched cache lines) is reused first.
//! - One mutex covers the whole pool; both operations are O(1) and the
//!   critical sections are a few instructions.

use parking_lot::Mutex;

/// A buffer on loan from a [`BufferPool`].
///
/// Ownership of the bytes travels with this value; returning the buffer
/// means moving it back into the pool. Dropping it without returning it
/// permanently shrinks the pool.
#[derive(Debug)]
pub struct PooledBuf {
    index: u32,
    data: Box<[u8]>,
}

impl PooledBuf {
    /// Read access to the full buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Write access for the receive path.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer has zero capacity. Never true for pool buffers.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

struct PoolInner {
    /// LIFO stack of free buffers.
    free: Vec<PooledBuf>,

    /// Loan bitmap indexed by buffer index. `true` = currently out.
    loaned: Vec<bool>,
}

/// Fixed pool of `capacity` receive buffers, each `buffer_size` bytes.
pub struct BufferPool {
    inner: Mutex<PoolInner>,
    buffer_size: usize,
    capacity: usize,
}

impl BufferPool {
    /// Allocate a pool of `capacity` buffers of `buffer_size` bytes each.
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        let mut free = Vec::with_capacity(capacity);
        for index in 0..capacity {
            free.push(PooledBuf {
                index: index as u32,
                data: vec![0u8; buffer_size].into_boxed_slice(),
            });
        }

        Self {
            inner: Mutex::new(PoolInner {
                free,
                loaned: vec![false; capacity],
            }),
            buffer_size,
            capacity,
        }
    }

    /// Take a buffer from the pool. Returns `None` when the pool is empty.
    pub fn acquire(&self) -> Option<PooledBuf> {
        let mut inner = self.inner.lock();
        let buf = inner.free.pop()?;
        inner.loaned[buf.index as usize] = true;
        Some(buf)
    }

    /// Return a buffer to the pool.
    ///
    /// A buffer that is not marked on loan (stale handle, foreign pool) is
    /// dropped; the pool never grows past its initial capacity.
    pub fn release(&self, buf: PooledBuf) {
        let mut inner = self.inner.lock();
        let idx = buf.index as usize;
        if idx >= self.capacity || !inner.loaned[idx] {
            tracing::debug!(index = buf.index, "buffer returned twice, dropping");
            return;
        }
        inner.loaned[idx] = false;
        if inner.free.len() < self.capacity {
            inner.free.push(buf);
        }
    }

    /// Number of buffers currently free.
    pub fn available(&self) -> usize {
        self.inner.lock().free.len()
    }

    /// Total number of buffers the pool was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size of each buffer in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

#[cfg(test)]
#[path = "buffer_pool_test.rs"]
mod buffer_pool_test;
