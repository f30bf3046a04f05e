use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use moka::sync::Cache;
use parking_lot::Mutex;

/// Upper bound on tracked client keys. Beyond this the least-recently-seen
/// records are evicted; an evicted record is always an expired window, since
/// idle eviction fires only after a full window with no requests.
const MAX_TRACKED_KEYS: u64 = 100_000;

/// Per-client counter state for one fixed window.
#[derive(Debug)]
struct WindowRecord {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Fixed-window request limiter keyed by client identifier.
///
/// The window is fixed, not sliding: the counter restarts wholesale when a
/// window expires, so a client can burst up to `2 * max_requests` across a
/// window boundary. That is the accepted trade-off for O(1) state per key.
///
/// Callers supply `now`, which keeps the window arithmetic deterministic
/// under test. State lives in process memory and resets on restart.
pub struct FixedWindowLimiter {
    records: Cache<String, Arc<Mutex<WindowRecord>>>,
    max_requests: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    /// Creates a limiter admitting `max_requests` per `window_secs` per key.
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        let records = Cache::builder()
            .max_capacity(MAX_TRACKED_KEYS)
            .time_to_idle(std::time::Duration::from_secs(window_secs))
            .build();

        Self {
            records,
            max_requests,
            window: Duration::seconds(window_secs as i64),
        }
    }

    /// Admits or rejects a request from `key` at time `now`.
    ///
    /// The first request of a window (fresh key, or `now` past the window
    /// end) restarts the counter at 1. A request at the cap is rejected
    /// without incrementing, so rejected traffic never extends the window.
    pub fn admit(&self, key: &str, now: DateTime<Utc>) -> bool {
        let record = self.records.get_with(key.to_string(), || {
            // count starts at 0 so the first locked caller takes the
            // fresh-window branch below
            Arc::new(Mutex::new(WindowRecord {
                count: 0,
                reset_at: now + self.window,
            }))
        });

        // Read-check-increment is serialized per key; concurrent requests
        // cannot jointly exceed max_requests.
        let mut record = record.lock();

        if record.count == 0 || now > record.reset_at {
            record.count = 1;
            record.reset_at = now + self.window;
            return true;
        }

        if record.count >= self.max_requests {
            return false;
        }

        record.count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 12, 0, 0).unwrap()
    }

    #[test]
    fn admits_up_to_max_then_rejects() {
        let limiter = FixedWindowLimiter::new(5, 900);

        for _ in 0..5 {
            assert!(limiter.admit("203.0.113.7", t0()));
        }
        assert!(!limiter.admit("203.0.113.7", t0()));
        assert!(!limiter.admit("203.0.113.7", t0()));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = FixedWindowLimiter::new(2, 900);

        assert!(limiter.admit("a", t0()));
        assert!(limiter.admit("a", t0()));
        assert!(!limiter.admit("a", t0()));

        assert!(limiter.admit("b", t0()));
    }

    #[test]
    fn window_expiry_restarts_the_counter() {
        let limiter = FixedWindowLimiter::new(5, 900);

        for _ in 0..5 {
            assert!(limiter.admit("key", t0()));
        }
        assert!(!limiter.admit("key", t0()));

        // Exactly at the window end the old window still applies
        let at_reset = t0() + Duration::seconds(900);
        assert!(!limiter.admit("key", at_reset));

        // Strictly past it, the counter restarts at 1
        let past_reset = t0() + Duration::seconds(901);
        assert!(limiter.admit("key", past_reset));
        for _ in 0..4 {
            assert!(limiter.admit("key", past_reset));
        }
        assert!(!limiter.admit("key", past_reset));
    }

    #[test]
    fn boundary_burst_admits_two_windows_worth() {
        let limiter = FixedWindowLimiter::new(5, 900);

        let end_of_window = t0() + Duration::seconds(899);
        for _ in 0..5 {
            assert!(limiter.admit("key", end_of_window));
        }

        // 10 admitted requests within two seconds of wall time: documented
        // fixed-window behavior
        let start_of_next = t0() + Duration::seconds(899 + 901);
        for _ in 0..5 {
            assert!(limiter.admit("key", start_of_next));
        }
        assert!(!limiter.admit("key", start_of_next));
    }

    #[test]
    fn rejections_do_not_extend_the_window() {
        let limiter = FixedWindowLimiter::new(1, 900);

        assert!(limiter.admit("key", t0()));
        // Hammering while rejected must not move reset_at
        for i in 0..10 {
            assert!(!limiter.admit("key", t0() + Duration::seconds(i)));
        }
        assert!(limiter.admit("key", t0() + Duration::seconds(901)));
    }

    #[test]
    fn concurrent_requests_never_exceed_the_cap() {
        let limiter = Arc::new(FixedWindowLimiter::new(5, 900));
        let now = t0();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                let mut admitted = 0u32;
                for _ in 0..25 {
                    if limiter.admit("shared", now) {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 5);
    }
}
