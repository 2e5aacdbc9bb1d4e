//! Utility functions module
//!
//! Clock helpers and signal handling used throughout the application.

pub mod clock;
pub mod signals;

// Re-export main functions
pub use clock::{format_clock, to_end_time, to_remaining, Clock, ManualClock, SystemClock};
pub use signals::shutdown_signal;
