//! Per-device countdown timer record

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::utils::clock::{format_clock, to_end_time, to_remaining};

/// Timers keyed by device identifier
pub type TimerMap = BTreeMap<String, Timer>;

/// Live countdown state for one device.
///
/// `is_active` is true exactly when `end_time` is set. While paused,
/// `remaining_seconds` is authoritative; while active it is the countdown
/// counter decremented by the driver and `end_time` is kept for reload
/// recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub device_id: String,
    pub label: String,
    pub remaining_seconds: u64,
    pub is_active: bool,
    pub end_time: Option<i64>,
    #[serde(default)]
    pub original_duration_minutes: u32,
}

impl Timer {
    /// Create an active timer for `minutes`, ending `minutes` from `now_ms`
    pub fn started(device_id: &str, label: &str, minutes: u32, now_ms: i64) -> Self {
        let remaining_seconds = u64::from(minutes) * 60;
        Self {
            device_id: device_id.to_string(),
            label: label.to_string(),
            remaining_seconds,
            is_active: true,
            end_time: Some(to_end_time(now_ms, remaining_seconds)),
            original_duration_minutes: minutes,
        }
    }

    /// Freeze the countdown at its current value
    pub fn pause(&mut self) {
        self.is_active = false;
        self.end_time = None;
    }

    /// Restart the countdown from the frozen value
    pub fn activate(&mut self, now_ms: i64) {
        self.is_active = true;
        self.end_time = Some(to_end_time(now_ms, self.remaining_seconds));
    }

    /// Zero the timer and take it out of the countdown
    pub fn expire(&mut self) {
        self.remaining_seconds = 0;
        self.is_active = false;
        self.end_time = None;
    }

    /// Seconds of the intended duration not yet used
    pub fn unused_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    /// Whether any time has run since the timer was started
    pub fn has_elapsed(&self) -> bool {
        self.remaining_seconds < u64::from(self.original_duration_minutes) * 60
    }

    /// Remaining time as reported to the dashboard
    pub fn display_remaining(&self, now_ms: i64) -> u64 {
        match self.end_time {
            Some(end) if self.is_active => to_remaining(now_ms, end).min(self.remaining_seconds),
            _ => self.remaining_seconds,
        }
    }

    pub fn clock(&self, now_ms: i64) -> String {
        format_clock(self.display_remaining(now_ms))
    }

    pub fn is_consistent(&self) -> bool {
        self.is_active == self.end_time.is_some()
    }
}
