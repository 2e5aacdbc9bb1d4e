//! TV Timer - A state-managed HTTP server for per-TV countdown timers
//!
//! This library runs the per-device timer lifecycle (start, pause, resume,
//! extend, stop), ticks every active timer from one shared countdown driver,
//! and records completed usage sessions for analytics.

pub mod analytics;
pub mod api;
pub mod config;
pub mod engine;
pub mod services;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use engine::{TimerEngine, TimerError};
pub use state::AppState;
pub use utils::signals::shutdown_signal;
