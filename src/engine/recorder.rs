//! Completed-session derivation and duplicate suppression

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    state::{CompletedSession, Timer},
    storage::HistoryStore,
};

/// How a timer lifecycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The countdown reached zero
    Expired,
    /// The operator stopped it, or it was replaced by a new start
    Stopped,
}

/// Outcome of a recording attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Appended(CompletedSession),
    /// An equivalent session was already in the history
    Duplicate,
    /// Stopped before any time ran; nothing to record
    NothingElapsed,
}

/// Minutes of usage to credit for a finished timer, `None` if nothing elapsed
pub fn used_minutes(timer: &Timer, termination: Termination) -> Option<u32> {
    let original = timer.original_duration_minutes.max(1);
    match termination {
        Termination::Expired => Some(original),
        Termination::Stopped if !timer.has_elapsed() => None,
        Termination::Stopped => {
            let unused = u32::try_from(timer.unused_seconds().div_ceil(60)).unwrap_or(u32::MAX);
            Some(original.saturating_sub(unused).max(1))
        }
    }
}

/// Turns terminal timers into history entries, at most once each
#[derive(Debug, Clone, Copy)]
pub struct SessionRecorder {
    /// Max distance between completion times of two equivalent sessions
    pub tolerance_secs: i64,
    /// Max difference in minutes between two equivalent sessions
    pub duration_slack: u32,
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self {
            tolerance_secs: 10,
            duration_slack: 1,
        }
    }
}

impl SessionRecorder {
    /// Whether `candidate` repeats a session already in `history`
    pub fn is_duplicate(&self, history: &[CompletedSession], candidate: &CompletedSession) -> bool {
        history.iter().any(|existing| {
            existing.device_id == candidate.device_id
                && (existing.completed_at - candidate.completed_at).num_seconds().abs() <= self.tolerance_secs
                && existing.duration_minutes.abs_diff(candidate.duration_minutes) <= self.duration_slack
        })
    }

    /// Append a session for `device_id` unless an equivalent one exists
    pub fn record(
        &self,
        history: &mut HistoryStore,
        device_id: &str,
        device_label: &str,
        duration_minutes: u32,
        completed_at: DateTime<Utc>,
    ) -> Recorded {
        let candidate = CompletedSession::ending_at(device_id, device_label, duration_minutes, completed_at);
        if self.is_duplicate(history.sessions(), &candidate) {
            debug!(
                "Discarding duplicate session for {} ({} min)",
                device_id, candidate.duration_minutes
            );
            return Recorded::Duplicate;
        }
        info!(
            "Recorded session for {} ({}): {} min",
            candidate.device_label, candidate.device_id, candidate.duration_minutes
        );
        history.push(candidate.clone());
        Recorded::Appended(candidate)
    }

    /// Record the end of a timer lifecycle
    pub fn record_timer(
        &self,
        history: &mut HistoryStore,
        timer: &Timer,
        termination: Termination,
        completed_at: DateTime<Utc>,
    ) -> Recorded {
        match used_minutes(timer, termination) {
            Some(minutes) => self.record(history, &timer.device_id, &timer.label, minutes, completed_at),
            None => {
                debug!("Timer for {} stopped before any time elapsed", timer.device_id);
                Recorded::NothingElapsed
            }
        }
    }
}
