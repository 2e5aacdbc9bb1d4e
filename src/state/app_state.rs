//! Main application state management

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{CompletedSession, Notice, Notices, TimerEvent, TimerMap};
use crate::{
    engine::{Outcome, StartupReport, TimerEngine, TimerError},
    services::{
        dispatch_effects, send_request, DeviceCommand, DeviceController, DeviceQueues, DeviceRequest,
    },
    tasks::Scheduler,
};

/// Application root: the timer engine, the countdown scheduler and the device
/// capability, plus server metadata for the status endpoint
pub struct AppState {
    /// Timers and analytics history; every action and tick runs under this lock
    engine: Mutex<TimerEngine>,
    pub scheduler: Scheduler,
    pub devices: Arc<dyn DeviceController>,
    /// Per-device ordering of outgoing commands
    pub device_queues: DeviceQueues,
    /// Recoverable failures shown to the operator
    pub notices: Mutex<Notices>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Mutex<Option<String>>,
    pub last_action_time: Mutex<Option<DateTime<Utc>>>,
    /// Dashboard notifications
    pub events_tx: broadcast::Sender<TimerEvent>,
}

impl AppState {
    pub fn new(
        engine: TimerEngine,
        devices: Arc<dyn DeviceController>,
        scheduler: Scheduler,
        port: u16,
        host: String,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(100);
        if engine.any_active() {
            scheduler.arm();
        }

        Self {
            engine: Mutex::new(engine),
            scheduler,
            devices,
            device_queues: DeviceQueues::new(),
            notices: Mutex::new(Notices::new()),
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
            events_tx,
        }
    }

    /// Surface problems found while loading persisted state
    pub fn report_startup(&self, report: &StartupReport) {
        if let Some(corrupt) = &report.timers.corrupt {
            self.add_notice("startup", format!("Stored timers were unreadable and have been reset: {}", corrupt));
        }
        if let Some(corrupt) = &report.history.corrupt {
            self.add_notice("startup", format!("Stored analytics were unreadable and have been reset: {}", corrupt));
        }
        if report.history.discarded > 0 {
            self.add_notice(
                "startup",
                format!("Dropped {} unreadable analytics sessions", report.history.discarded),
            );
        }
        if !report.timers.expired.is_empty() {
            info!(
                "Dropped {} timers that expired while the server was down: {:?}",
                report.timers.expired.len(),
                report.timers.expired
            );
        }
    }

    fn lock_engine(&self) -> Result<MutexGuard<'_, TimerEngine>, TimerError> {
        self.engine
            .lock()
            .map_err(|e| TimerError::StateUnavailable(format!("Failed to lock timer engine: {}", e)))
    }

    /// Apply an engine action, then publish its events and dispatch its device commands
    pub fn apply<F>(self: &Arc<Self>, action: &str, updater: F) -> Result<Outcome, TimerError>
    where
        F: FnOnce(&mut TimerEngine) -> Result<Outcome, TimerError>,
    {
        let mut engine = self.lock_engine()?;
        let outcome = updater(&mut *engine)?;
        if engine.any_active() {
            self.scheduler.arm();
        }
        drop(engine); // Release the lock before any side effect

        if outcome.changed {
            if let Ok(mut last_action) = self.last_action.lock() {
                *last_action = Some(action.to_string());
            }
            if let Ok(mut last_time) = self.last_action_time.lock() {
                *last_time = Some(Utc::now());
            }
        }

        self.finish(&outcome);
        Ok(outcome)
    }

    pub fn start_timer(self: &Arc<Self>, device_id: &str, label: &str, minutes: i64) -> Result<Outcome, TimerError> {
        self.apply("start", |engine| engine.start(device_id, label, minutes))
    }

    pub fn pause_timer(self: &Arc<Self>, device_id: &str) -> Result<Outcome, TimerError> {
        self.apply("pause", |engine| Ok(engine.pause(device_id)))
    }

    pub fn resume_timer(self: &Arc<Self>, device_id: &str) -> Result<Outcome, TimerError> {
        self.apply("resume", |engine| Ok(engine.resume(device_id)))
    }

    pub fn stop_timer(self: &Arc<Self>, device_id: &str) -> Result<Outcome, TimerError> {
        self.apply("stop", |engine| Ok(engine.stop(device_id)))
    }

    pub fn extend_timer(self: &Arc<Self>, device_id: &str, minutes: i64) -> Result<Outcome, TimerError> {
        self.apply("extend", |engine| engine.extend(device_id, minutes))
    }

    /// Pick up timer changes written by another instance
    pub fn reload_timers(self: &Arc<Self>) -> Result<Outcome, TimerError> {
        self.apply("reload", |engine| {
            let (outcome, report) = engine.reload();
            if !report.expired.is_empty() {
                info!("Reload dropped expired timers: {:?}", report.expired);
            }
            Ok(outcome)
        })
    }

    pub fn clear_history(self: &Arc<Self>) -> Result<Outcome, TimerError> {
        self.apply("clear-history", |engine| Ok(engine.clear_history()))
    }

    /// Run one countdown tick; returns whether any timer is still active.
    /// Disarms the scheduler when nothing is left to count down.
    pub fn tick(self: &Arc<Self>) -> Result<bool, TimerError> {
        let mut engine = self.lock_engine()?;
        let tick = engine.tick();
        if !tick.any_active {
            self.scheduler.disarm();
        }
        drop(engine);

        self.finish(&tick.outcome);
        Ok(tick.any_active)
    }

    /// Send a pass-through command from the dashboard and wait for the result
    pub async fn send_command(&self, device_id: &str, command: DeviceCommand) -> bool {
        let label = self
            .lock_engine()
            .ok()
            .and_then(|engine| engine.timer(device_id).map(|timer| timer.label.clone()))
            .unwrap_or_else(|| device_id.to_string());
        send_request(self, DeviceRequest::new(device_id, &label, command)).await
    }

    fn finish(self: &Arc<Self>, outcome: &Outcome) {
        if outcome.failures.is_empty() {
            if outcome.persisted {
                self.clear_notices_for("storage");
            }
        } else {
            for failure in &outcome.failures {
                self.add_notice("storage", failure.clone());
            }
        }
        for event in &outcome.events {
            self.publish(event.clone());
        }
        dispatch_effects(self, outcome.effects.clone());
    }

    /// Get a copy of all timers
    pub fn get_timers(&self) -> Result<TimerMap, TimerError> {
        self.lock_engine().map(|engine| engine.timers().clone())
    }

    /// Get a copy of the analytics history
    pub fn get_sessions(&self) -> Result<Vec<CompletedSession>, TimerError> {
        self.lock_engine().map(|engine| engine.sessions().to_vec())
    }

    pub fn now_ms(&self) -> Result<i64, TimerError> {
        self.lock_engine().map(|engine| engine.now_ms())
    }

    pub fn publish(&self, event: TimerEvent) {
        // No subscribers is the normal case when no dashboard is open
        let _ = self.events_tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events_tx.subscribe()
    }

    pub fn add_notice(&self, component: &str, message: String) {
        match self.notices.lock() {
            Ok(mut notices) => {
                warn!("Adding notice for {}: {}", component, message);
                notices.add(component, message);
            }
            Err(e) => warn!("Failed to lock notices: {}", e),
        }
    }

    pub fn clear_notices_for(&self, component: &str) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.clear_for(component);
        }
    }

    pub fn get_notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|notices| notices.items.clone())
            .unwrap_or_default()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
