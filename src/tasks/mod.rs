//! Background tasks module
//!
//! The countdown driver runs alongside the HTTP server, paced by the shared scheduler.

pub mod countdown;
pub mod scheduler;

// Re-export main types
pub use countdown::countdown_task;
pub use scheduler::Scheduler;
