//! Timer lifecycle engine
//!
//! Owns the live timer set and the analytics history. Every action runs to
//! completion synchronously: transition, session recording, persistence. Device
//! commands and dashboard events are returned in an [`Outcome`] for the caller
//! to dispatch after the engine lock is released.

pub mod actions;
pub mod countdown;
pub mod error;
pub mod recorder;

use std::sync::Arc;
use tracing::{info, warn};

pub use actions::Applied;
pub use countdown::{TickOutcome, TICK_PERIOD};
pub use error::TimerError;
pub use recorder::{Recorded, SessionRecorder, Termination};

use crate::{
    services::{DeviceCommand, DeviceRequest},
    state::{CompletedSession, RemovalReason, Timer, TimerEvent, TimerMap},
    storage::{HistoryReport, HistoryStore, LoadReport, Storage, TimerStore},
    utils::clock::Clock,
};

/// Side effects produced by one engine call
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// Timer state after the action, `None` when absent
    pub timer: Option<Timer>,
    /// Whether anything changed
    pub changed: bool,
    pub events: Vec<TimerEvent>,
    pub effects: Vec<DeviceRequest>,
    /// Persistence failures to surface to the operator
    pub failures: Vec<String>,
    /// Whether at least one write succeeded
    pub persisted: bool,
}

impl Outcome {
    pub fn recorded_sessions(&self) -> impl Iterator<Item = &CompletedSession> {
        self.events.iter().filter_map(|event| match event {
            TimerEvent::SessionRecorded { session } => Some(session),
            _ => None,
        })
    }
}

/// Problems found while loading persisted state
#[derive(Debug, Clone, Default)]
pub struct StartupReport {
    pub timers: LoadReport,
    pub history: HistoryReport,
}

pub struct TimerEngine {
    clock: Arc<dyn Clock>,
    timers: TimerStore,
    history: HistoryStore,
    recorder: SessionRecorder,
}

impl TimerEngine {
    /// Load timers and history from `storage`
    pub fn load(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> (Self, StartupReport) {
        let (timers, timer_report) = TimerStore::load(Arc::clone(&storage), clock.now_ms());
        let (history, history_report) = HistoryStore::load(storage);
        let engine = Self {
            clock,
            timers,
            history,
            recorder: SessionRecorder::default(),
        };
        (
            engine,
            StartupReport {
                timers: timer_report,
                history: history_report,
            },
        )
    }

    pub fn timers(&self) -> &TimerMap {
        self.timers.timers()
    }

    pub fn timer(&self, device_id: &str) -> Option<&Timer> {
        self.timers.get(device_id)
    }

    pub fn sessions(&self) -> &[CompletedSession] {
        self.history.sessions()
    }

    pub fn any_active(&self) -> bool {
        self.timers.any_active()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Start (or restart) a timer for a device
    pub fn start(&mut self, device_id: &str, label: &str, minutes: i64) -> Result<Outcome, TimerError> {
        let now_ms = self.clock.now_ms();
        let (timer, replaced) = actions::start(self.timers.timers_mut(), device_id, label, minutes, now_ms)?;
        info!("Timer started for {} ({}): {} min", timer.label, device_id, timer.original_duration_minutes);

        let mut outcome = Outcome::default();
        if let Some(previous) = replaced {
            info!("Replacing running timer for {}", device_id);
            self.record(&previous, Termination::Stopped, &mut outcome);
        }
        outcome.effects.push(DeviceRequest::new(device_id, &timer.label, DeviceCommand::PowerOn));
        self.changed(timer, &mut outcome);
        Ok(outcome)
    }

    pub fn pause(&mut self, device_id: &str) -> Outcome {
        let applied = actions::pause(self.timers.timers_mut(), device_id);
        if let Applied::Changed(timer) = &applied {
            info!("Timer paused for {} with {}s left", device_id, timer.remaining_seconds);
        }
        self.applied(applied)
    }

    pub fn resume(&mut self, device_id: &str) -> Outcome {
        let now_ms = self.clock.now_ms();
        let applied = actions::resume(self.timers.timers_mut(), device_id, now_ms);
        if let Applied::Changed(timer) = &applied {
            info!("Timer resumed for {} with {}s left", device_id, timer.remaining_seconds);
        }
        self.applied(applied)
    }

    /// Remove a timer and record the used portion
    pub fn stop(&mut self, device_id: &str) -> Outcome {
        let mut outcome = Outcome::default();
        let Some(timer) = actions::stop(self.timers.timers_mut(), device_id) else {
            return outcome;
        };
        info!("Timer stopped for {} with {}s left", device_id, timer.remaining_seconds);

        outcome.changed = true;
        self.record(&timer, Termination::Stopped, &mut outcome);
        outcome.effects.push(DeviceRequest::new(device_id, &timer.label, DeviceCommand::SwitchToHome));
        outcome.events.push(TimerEvent::TimerRemoved {
            device_id: device_id.to_string(),
            reason: RemovalReason::Stopped,
        });
        self.persist_timers(&mut outcome);
        outcome
    }

    /// Add minutes to a timer, resuming it if paused
    pub fn extend(&mut self, device_id: &str, minutes: i64) -> Result<Outcome, TimerError> {
        let now_ms = self.clock.now_ms();
        let Some(timer) = actions::extend(self.timers.timers_mut(), device_id, minutes, now_ms)? else {
            return Ok(Outcome::default());
        };
        info!(
            "Timer extended for {} by {} min, now {} min total",
            device_id, minutes, timer.original_duration_minutes
        );

        let mut outcome = Outcome::default();
        outcome.effects.push(DeviceRequest::new(
            device_id,
            &timer.label,
            DeviceCommand::SwitchToExtendInput,
        ));
        self.changed(timer, &mut outcome);
        Ok(outcome)
    }

    /// Re-read persisted timers after an outside writer changed them.
    /// Expired entries are dropped; completion is never detected here.
    pub fn reload(&mut self) -> (Outcome, LoadReport) {
        let before: Vec<String> = self.timers.timers().keys().cloned().collect();
        let report = self.timers.reload(self.clock.now_ms());
        let mut outcome = Outcome {
            changed: true,
            ..Outcome::default()
        };
        for device_id in before {
            if self.timers.get(&device_id).is_some() {
                continue;
            }
            let reason = if report.expired.contains(&device_id) {
                RemovalReason::Expired
            } else {
                RemovalReason::External
            };
            outcome.events.push(TimerEvent::TimerRemoved { device_id, reason });
        }
        outcome.events.extend(
            self.timers
                .timers()
                .values()
                .cloned()
                .map(|timer| TimerEvent::TimerChanged { timer }),
        );
        if let Some(corrupt) = &report.corrupt {
            outcome.failures.push(format!("Stored timers were unreadable: {}", corrupt));
        }
        (outcome, report)
    }

    /// Empty the analytics history
    pub fn clear_history(&mut self) -> Outcome {
        let mut outcome = Outcome {
            changed: true,
            ..Outcome::default()
        };
        info!("Clearing {} recorded sessions", self.history.sessions().len());
        self.history.clear();
        self.persist_history(&mut outcome);
        outcome
    }

    fn applied(&mut self, applied: Applied) -> Outcome {
        match applied {
            Applied::Changed(timer) => {
                let mut outcome = Outcome::default();
                self.changed(timer, &mut outcome);
                outcome
            }
            Applied::Unchanged(timer) => Outcome {
                timer: Some(timer),
                ..Outcome::default()
            },
            Applied::Absent => Outcome::default(),
        }
    }

    fn changed(&mut self, timer: Timer, outcome: &mut Outcome) {
        outcome.changed = true;
        outcome.events.push(TimerEvent::TimerChanged { timer: timer.clone() });
        outcome.timer = Some(timer);
        self.persist_timers(outcome);
    }

    fn record(&mut self, timer: &Timer, termination: Termination, outcome: &mut Outcome) {
        let completed_at = self.clock.now();
        if let Recorded::Appended(session) =
            self.recorder
                .record_timer(&mut self.history, timer, termination, completed_at)
        {
            outcome.events.push(TimerEvent::SessionRecorded { session });
            self.persist_history(outcome);
        }
    }

    fn persist_timers(&self, outcome: &mut Outcome) {
        match self.timers.save() {
            Ok(()) => outcome.persisted = true,
            Err(e) => {
                warn!("Failed to persist timers: {}", e);
                outcome.failures.push(format!("Failed to save timers: {}", e));
            }
        }
    }

    fn persist_history(&self, outcome: &mut Outcome) {
        match self.history.save() {
            Ok(()) => outcome.persisted = true,
            Err(e) => {
                warn!("Failed to persist analytics history: {}", e);
                outcome.failures.push(format!("Failed to save analytics history: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::{MemoryStorage, TIMERS_KEY},
        utils::clock::{to_remaining, ManualClock},
    };

    const START: i64 = 1_700_000_000_000;

    fn engine() -> (TimerEngine, ManualClock, MemoryStorage) {
        let clock = ManualClock::new(START);
        let storage = MemoryStorage::new();
        let (engine, _) = TimerEngine::load(Arc::new(storage.clone()), Arc::new(clock.clone()));
        (engine, clock, storage)
    }

    fn assert_invariant(engine: &TimerEngine) {
        for timer in engine.timers().values() {
            assert!(timer.is_consistent(), "inconsistent timer {:?}", timer);
        }
    }

    #[test]
    fn start_sets_end_time_and_requests_power_on() {
        let (mut engine, clock, _) = engine();
        let outcome = engine.start("d", "L", 30).unwrap();
        let timer = outcome.timer.unwrap();
        let remaining = to_remaining(clock.now_ms(), timer.end_time.unwrap());
        assert!((1799..=1800).contains(&remaining));
        assert_eq!(outcome.effects[0].command, DeviceCommand::PowerOn);
        assert_invariant(&engine);
    }

    #[test]
    fn every_action_keeps_active_iff_end_time() {
        let (mut engine, clock, _) = engine();
        engine.start("a", "A", 5).unwrap();
        engine.start("b", "B", 5).unwrap();
        assert_invariant(&engine);
        engine.pause("a");
        assert_invariant(&engine);
        clock.advance_secs(30);
        engine.tick();
        assert_invariant(&engine);
        engine.extend("a", 2).unwrap();
        assert_invariant(&engine);
        engine.resume("b");
        engine.pause("b");
        engine.pause("b");
        assert_invariant(&engine);
        engine.stop("a");
        assert_invariant(&engine);
    }

    #[test]
    fn invalid_start_leaves_state_untouched() {
        let (mut engine, _, storage) = engine();
        assert_eq!(engine.start("d", "L", 0).unwrap_err(), TimerError::InvalidDuration(0));
        assert!(engine.timers().is_empty());
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn every_mutation_is_persisted() {
        let (mut engine, _, storage) = engine();
        engine.start("d", "L", 10).unwrap();
        engine.pause("d");
        engine.resume("d");
        engine.extend("d", 1).unwrap();
        assert_eq!(storage.write_count(), 4);
        // no-ops write nothing
        engine.resume("d");
        engine.pause("missing");
        assert_eq!(storage.write_count(), 4);
    }

    #[test]
    fn early_stop_records_partial_duration_once() {
        let (mut engine, clock, _) = engine();
        engine.start("d", "L", 10).unwrap();
        for _ in 0..120 {
            clock.advance_secs(1);
            engine.tick();
        }
        let outcome = engine.stop("d");
        assert!(engine.timer("d").is_none());
        assert_eq!(engine.sessions().len(), 1);
        assert_eq!(engine.sessions()[0].duration_minutes, 2);
        assert_eq!(outcome.effects[0].command, DeviceCommand::SwitchToHome);

        let again = engine.stop("d");
        assert!(!again.changed);
        assert_eq!(engine.sessions().len(), 1);
    }

    #[test]
    fn immediate_stop_records_nothing() {
        let (mut engine, _, _) = engine();
        engine.start("d", "L", 10).unwrap();
        let outcome = engine.stop("d");
        assert!(outcome.changed);
        assert!(engine.sessions().is_empty());
    }

    #[test]
    fn restart_closes_previous_lifecycle() {
        let (mut engine, clock, _) = engine();
        engine.start("d", "L", 10).unwrap();
        for _ in 0..300 {
            clock.advance_secs(1);
            engine.tick();
        }
        let outcome = engine.start("d", "L", 20).unwrap();
        assert_eq!(outcome.recorded_sessions().count(), 1);
        assert_eq!(engine.sessions()[0].duration_minutes, 5);
        assert_eq!(engine.timer("d").unwrap().original_duration_minutes, 20);
    }

    #[test]
    fn extend_requests_extend_input() {
        let (mut engine, _, _) = engine();
        engine.start("d", "L", 10).unwrap();
        let outcome = engine.extend("d", 5).unwrap();
        assert_eq!(outcome.effects[0].command, DeviceCommand::SwitchToExtendInput);
        assert_eq!(engine.timer("d").unwrap().original_duration_minutes, 15);
    }

    #[test]
    fn write_failure_is_reported_but_state_kept() {
        let (mut engine, _, storage) = engine();
        storage.set_fail_writes(true);
        let outcome = engine.start("d", "L", 10).unwrap();
        assert_eq!(outcome.failures.len(), 1);
        assert!(engine.timer("d").is_some());
    }

    #[test]
    fn reload_picks_up_external_changes() {
        let (mut engine, clock, storage) = engine();
        engine.start("d", "L", 10).unwrap();
        storage.insert_raw(TIMERS_KEY, "{}");
        clock.advance_secs(1);
        let (_, report) = engine.reload();
        assert!(engine.timers().is_empty());
        assert!(report.corrupt.is_none());
        assert!(engine.sessions().is_empty());
    }

    #[test]
    fn reload_reports_timers_that_disappeared() {
        let (mut engine, clock, storage) = engine();
        engine.start("gone", "L", 10).unwrap();
        engine.start("late", "L", 1).unwrap();
        engine.start("kept", "L", 10).unwrap();

        let blob = serde_json::to_string(engine.timers()).unwrap();
        let mut external: TimerMap = serde_json::from_str(&blob).unwrap();
        external.remove("gone");
        storage.insert_raw(TIMERS_KEY, &serde_json::to_string(&external).unwrap());
        clock.advance_secs(120);

        let (outcome, _) = engine.reload();
        let removed: Vec<(String, RemovalReason)> = outcome
            .events
            .iter()
            .filter_map(|event| match event {
                TimerEvent::TimerRemoved { device_id, reason } => Some((device_id.clone(), *reason)),
                _ => None,
            })
            .collect();
        assert_eq!(
            removed,
            vec![
                ("gone".to_string(), RemovalReason::External),
                ("late".to_string(), RemovalReason::Expired),
            ]
        );
        assert!(engine.timer("kept").is_some());
    }

    #[test]
    fn successful_writes_are_flagged() {
        let (mut engine, _, storage) = engine();
        assert!(engine.start("d", "L", 10).unwrap().persisted);
        assert!(!engine.pause("missing").persisted);
        storage.set_fail_writes(true);
        assert!(!engine.pause("d").persisted);
    }

    #[test]
    fn restored_engine_continues_countdown() {
        let (mut engine, clock, storage) = engine();
        engine.start("d", "L", 10).unwrap();
        clock.advance_secs(90);

        let (restored, report) = TimerEngine::load(Arc::new(storage), Arc::new(clock.clone()));
        assert_eq!(report.timers.restored, 1);
        let timer = restored.timer("d").unwrap();
        assert!(timer.is_active);
        assert_eq!(timer.remaining_seconds, 510);
    }
}
