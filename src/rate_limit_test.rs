use super::*;

fn config() -> RateLimitConfig {
    RateLimitConfig { draw_capacity: 2, draw_refill_per_sec: 1.0, cursor_capacity: 2, cursor_refill_per_sec: 1.0 }
}

#[test]
fn bucket_allows_up_to_capacity_then_blocks() {
    let now = Instant::now();
    let mut bucket = Bucket::new(2.0, 1.0, now);
    assert!(bucket.try_take(now));
    assert!(bucket.try_take(now));
    assert!(!bucket.try_take(now));
}

#[test]
fn bucket_refills_with_elapsed_wall_time() {
    let now = Instant::now();
    let mut bucket = Bucket::new(2.0, 1.0, now);
    assert!(bucket.try_take(now));
    assert!(bucket.try_take(now));
    assert!(!bucket.try_take(now));

    let later = now + Duration::from_millis(1100);
    assert!(bucket.try_take(later), "one token should have refilled after ~1.1s at 1/s");
}

#[test]
fn bucket_refill_is_capped_at_capacity() {
    let now = Instant::now();
    let mut bucket = Bucket::new(2.0, 1.0, now);
    let far_future = now + Duration::from_secs(3600);
    // Burst after a long idle period is still capped at capacity (2), not
    // however many tokens would have mathematically accrued.
    assert!(bucket.try_take(far_future));
    assert!(bucket.try_take(far_future));
    assert!(!bucket.try_take(far_future));
}

#[test]
fn rate_limiter_tracks_draw_and_cursor_independently() {
    let limiter = RateLimiter::new(config());
    let conn = Uuid::new_v4();

    assert!(limiter.try_take(conn, Class::Draw));
    assert!(limiter.try_take(conn, Class::Draw));
    assert!(!limiter.try_take(conn, Class::Draw));

    // Cursor's bucket is untouched by draw's exhaustion.
    assert!(limiter.try_take(conn, Class::Cursor));
}

#[test]
fn forget_drops_a_connections_buckets() {
    let limiter = RateLimiter::new(config());
    let conn = Uuid::new_v4();

    assert!(limiter.try_take(conn, Class::Draw));
    assert!(limiter.try_take(conn, Class::Draw));
    assert!(!limiter.try_take(conn, Class::Draw));

    limiter.forget(conn);

    // A fresh bucket is created on next use, back at full capacity.
    assert!(limiter.try_take(conn, Class::Draw));
}
