//! Timer action errors

use thiserror::Error;

/// Reasons an action is rejected before it reaches the state machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("Timer duration must be at least one minute, got {0}")]
    InvalidDuration(i64),

    #[error("Extension must be at least one minute, got {0}")]
    InvalidExtension(i64),

    #[error("Device id must not be empty")]
    InvalidDeviceId,

    #[error("Timer state unavailable: {0}")]
    StateUnavailable(String),
}

pub type Result<T, E = TimerError> = std::result::Result<T, E>;
