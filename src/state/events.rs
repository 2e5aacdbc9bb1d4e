//! Notifications pushed to the dashboard

use serde::Serialize;

use super::{CompletedSession, Timer};

/// Why a timer left the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RemovalReason {
    Expired,
    Stopped,
    /// Gone from storage when it was re-read
    External,
}

/// Display-only events; nothing in the state machine listens to them
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimerEvent {
    TimerChanged {
        timer: Timer,
    },
    TimerRemoved {
        #[serde(rename = "deviceId")]
        device_id: String,
        reason: RemovalReason,
    },
    SessionRecorded {
        session: CompletedSession,
    },
    DeviceCommandFailed {
        #[serde(rename = "deviceId")]
        device_id: String,
        command: String,
        error: String,
    },
}

impl TimerEvent {
    /// Event name used on the SSE stream
    pub fn name(&self) -> &'static str {
        match self {
            TimerEvent::TimerChanged { .. } => "timer-changed",
            TimerEvent::TimerRemoved { .. } => "timer-removed",
            TimerEvent::SessionRecorded { .. } => "session-recorded",
            TimerEvent::DeviceCommandFailed { .. } => "device-command-failed",
        }
    }
}
