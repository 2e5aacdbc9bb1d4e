//! State management module
//!
//! Timer and session records, dashboard events, operator notices, and the
//! application state that ties them to the engine.

pub mod app_state;
pub mod events;
pub mod notices;
pub mod session;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use events::{RemovalReason, TimerEvent};
pub use notices::{Notice, Notices};
pub use session::{CompletedSession, SessionHistory};
pub use timer_state::{Timer, TimerMap};
