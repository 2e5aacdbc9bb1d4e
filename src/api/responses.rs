//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{Notice, Timer, TimerMap};

/// Timer as shown on the dashboard
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    #[serde(flatten)]
    pub timer: Timer,
    /// `MM:SS` countdown
    pub clock: String,
}

impl TimerView {
    pub fn new(timer: Timer, now_ms: i64) -> Self {
        let clock = timer.clock(now_ms);
        Self { timer, clock }
    }

    pub fn all(timers: TimerMap, now_ms: i64) -> Vec<Self> {
        timers.into_values().map(|timer| Self::new(timer, now_ms)).collect()
    }
}

/// API response structure for timer action endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: Option<TimerView>,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: &str, message: String, timer: Option<TimerView>) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    /// Create an active response
    pub fn active(message: String, timer: Option<TimerView>) -> Self {
        Self::new("active", message, timer)
    }

    /// Create an inactive response
    pub fn inactive(message: String, timer: Option<TimerView>) -> Self {
        Self::new("inactive", message, timer)
    }

    /// Create a response for an action that did nothing
    pub fn unchanged(message: String, timer: Option<TimerView>) -> Self {
        Self::new("unchanged", message, timer)
    }

    /// Create an error response
    pub fn error(message: String) -> Self {
        Self::new("error", message, None)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub label: String,
    pub minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtendRequest {
    pub minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub status: String,
    pub device_id: String,
    pub command: String,
    pub timestamp: DateTime<Utc>,
}

/// Enhanced status response with timer information
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub timers: usize,
    pub active_timers: usize,
    pub driver_armed: bool,
    pub recorded_sessions: usize,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
    pub notices: Vec<Notice>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
