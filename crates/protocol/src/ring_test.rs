//! Tests for the segment ring.

use std::sync::Arc;

use crate::buffer_pool::BufferPool;
use crate::ring::{PushOutcome, SegmentRing};
use crate::segment::Segment;

fn segment_with_body(pool: &BufferPool, body: &[u8]) -> Segment {
    let mut buf = pool.acquire().expect("pool exhausted in test setup");
    buf.as_mut_slice()[..body.len()].copy_from_slice(body);
    Segment::new(buf, 0, body.len())
}

/// Ring with a tiny pool still gets the configured capacity floor.
#[test]
fn test_capacity_floor() {
    let pool = Arc::new(BufferPool::new(4, 64));
    let ring = SegmentRing::new(4, 250, pool);
    assert_eq!(ring.capacity(), 250);
}

#[test]
fn test_capacity_follows_large_pools() {
    let pool = Arc::new(BufferPool::new(1, 64));
    let ring = SegmentRing::new(400, 250, pool);
    assert_eq!(ring.capacity(), 400);
}

#[tokio::test]
async fn test_push_pop_fifo() {
    let pool = Arc::new(BufferPool::new(4, 64));
    let ring = SegmentRing::new(4, 4, Arc::clone(&pool));

    assert_eq!(
        ring.push(segment_with_body(&pool, b"one")).unwrap(),
        PushOutcome::Stored
    );
    assert_eq!(
        ring.push(segment_with_body(&pool, b"two")).unwrap(),
        PushOutcome::Stored
    );

    assert_eq!(ring.pop().await.unwrap().body(), b"one");
    assert_eq!(ring.pop().await.unwrap().body(), b"two");
}

#[tokio::test]
async fn test_displacement_returns_buffer_and_counts() {
    // Pool large enough that the ring bound (250) is the limiting factor
    // would make the test slow; instead exercise displacement through a
    // ring whose capacity equals the floor by filling it completely.
    let pool = Arc::new(BufferPool::new(251, 16));
    let ring = SegmentRing::new(1, 250, Arc::clone(&pool));
    assert_eq!(ring.capacity(), 250);

    for i in 0..250u32 {
        let body = format!("{:03}", i);
        assert_eq!(
            ring.push(segment_with_body(&pool, body.as_bytes())).unwrap(),
            PushOutcome::Stored
        );
    }
    assert_eq!(pool.available(), 1);

    // One more displaces the oldest; its buffer must come back.
    let outcome = ring.push(segment_with_body(&pool, b"new")).unwrap();
    assert_eq!(outcome, PushOutcome::Displaced);
    assert_eq!(ring.truncated_count(), 1);
    assert_eq!(ring.len(), 250);
    assert_eq!(pool.available(), 1);

    // Oldest element is gone; head is now "001".
    assert_eq!(ring.pop().await.unwrap().body(), b"001");
}

#[tokio::test]
async fn test_close_then_drain() {
    let pool = Arc::new(BufferPool::new(4, 64));
    let ring = SegmentRing::new(4, 4, Arc::clone(&pool));

    ring.push(segment_with_body(&pool, b"last")).unwrap();
    ring.close();

    assert_eq!(ring.pop().await.unwrap().body(), b"last");
    assert!(ring.pop().await.is_none());
}

#[test]
fn test_push_after_close_rejected() {
    let pool = Arc::new(BufferPool::new(4, 64));
    let ring = SegmentRing::new(4, 4, Arc::clone(&pool));
    ring.close();

    let segment = segment_with_body(&pool, b"late");
    let rejected = ring.push(segment).unwrap_err();
    pool.release(rejected.into_buf());
    assert_eq!(pool.available(), 4);
    assert_eq!(ring.truncated_count(), 0);
}
