//! Segment handle.
//!
//! A segment is the body portion of an accepted datagram, addressed as a
//! range inside the pool buffer the datagram was read into. The buffer
//! stays on loan until the batch processor copies the body into an owned
//! string at seal time.

use crate::buffer_pool::PooledBuf;

/// An accepted trace segment still resident in its receive buffer.
#[derive(Debug)]
pub struct Segment {
    buf: PooledBuf,
    body_start: usize,
    body_len: usize,
}

impl Segment {
    /// Build a segment from its buffer and the body range within it.
    ///
    /// `body_start + body_len` must lie inside the buffer; the receiver
    /// derives both from the datagram length, so this is asserted rather
    /// than propagated.
    pub fn new(buf: PooledBuf, body_start: usize, body_len: usize) -> Self {
        debug_assert!(body_start + body_len <= buf.len());
        Self {
            buf,
            body_start,
            body_len,
        }
    }

    /// The segment document bytes.
    pub fn body(&self) -> &[u8] {
        &self.buf.as_slice()[self.body_start..self.body_start + self.body_len]
    }

    /// Copy the document into an owned string, replacing any invalid UTF-8
    /// rather than failing; the service rejects garbage documents itself.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(self.body()).into_owned()
    }

    /// Give up the segment and recover its buffer for the pool.
    pub fn into_buf(self) -> PooledBuf {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPool;

    #[test]
    fn test_body_range() {
        let pool = BufferPool::new(1, 64);
        let mut buf = pool.acquire().unwrap();
        buf.as_mut_slice()[..10].copy_from_slice(b"hdr\n{body}");

        let segment = Segment::new(buf, 4, 6);
        assert_eq!(segment.body(), b"{body}");
        assert_eq!(segment.body_string(), "{body}");

        pool.release(segment.into_buf());
        assert_eq!(pool.available(), 1);
    }
}
