//! Usage analytics over the recorded session history

pub mod summary;

pub use summary::{filter_sessions, summarize, DailyUsage, DeviceUsage, HourlyUsage, SessionFilter, UsageSummary};
