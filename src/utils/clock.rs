//! Wall clock abstraction and duration helpers

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};
use chrono::{DateTime, TimeZone, Utc};

/// Source of the current time in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;

    /// Current time as a UTC timestamp
    fn now(&self) -> DateTime<Utc> {
        ms_to_datetime(self.now_ms())
    }
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Virtual clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can hold one handle
/// and advance time under an engine that owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn advance_secs(&self, seconds: i64) {
        self.now_ms.fetch_add(seconds * 1000, Ordering::SeqCst);
    }

    pub fn set_ms(&self, ms: i64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Absolute end time for a countdown with `remaining_seconds` left
pub fn to_end_time(now_ms: i64, remaining_seconds: u64) -> i64 {
    now_ms + (remaining_seconds as i64) * 1000
}

/// Whole seconds left until `end_time_ms`, never negative
pub fn to_remaining(now_ms: i64, end_time_ms: i64) -> u64 {
    let diff = end_time_ms - now_ms;
    if diff <= 0 {
        0
    } else {
        (diff / 1000) as u64
    }
}

/// Format seconds as `MM:SS`; the minutes field grows past 59 for long timers
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_time_and_remaining_agree() {
        let now = 1_700_000_000_000;
        let end = to_end_time(now, 1800);
        assert_eq!(end, now + 1_800_000);
        assert_eq!(to_remaining(now, end), 1800);
        assert_eq!(to_remaining(now + 500, end), 1799);
    }

    #[test]
    fn remaining_clamps_at_zero() {
        assert_eq!(to_remaining(10_000, 5_000), 0);
        assert_eq!(to_remaining(10_000, 10_000), 0);
    }

    #[test]
    fn clock_format_pads_and_overflows_minutes() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(3599), "59:59");
        assert_eq!(format_clock(7200), "120:00");
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let handle = clock.clone();
        handle.advance_secs(3);
        assert_eq!(clock.now_ms(), 4_000);
        clock.set_ms(0);
        assert_eq!(handle.now_ms(), 0);
    }
}
