//! One countdown tick over every active timer

use std::time::Duration;
use tracing::{debug, info};

use super::{Outcome, Termination, TimerEngine};
use crate::{
    services::{DeviceCommand, DeviceRequest},
    state::{RemovalReason, TimerEvent},
};

/// Wall-clock spacing of ticks. Each tick takes exactly this much off every
/// active timer, so the two must stay in step.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Result of a single tick
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Devices whose timers reached zero on this tick
    pub expired: Vec<String>,
    /// Whether any timer is still counting down afterwards
    pub any_active: bool,
    pub outcome: Outcome,
}

impl TimerEngine {
    /// Advance every active timer by one second.
    ///
    /// Each active timer's counter is decremented once, so a timer started for
    /// N seconds expires on its Nth tick. Expired timers are recorded with
    /// their full intended duration, sent home, and removed before the tick
    /// returns. Paused timers are untouched.
    pub fn tick(&mut self) -> TickOutcome {
        let mut expired = Vec::new();
        for (device_id, timer) in self.timers.timers_mut().iter_mut() {
            if !timer.is_active {
                continue;
            }
            timer.remaining_seconds = timer.remaining_seconds.saturating_sub(1);
            if timer.remaining_seconds == 0 {
                timer.expire();
                expired.push(device_id.clone());
            }
        }

        let mut outcome = Outcome::default();
        for device_id in &expired {
            let Some(timer) = self.timers.timers_mut().remove(device_id) else {
                continue;
            };
            info!("Timer expired for {} ({})", timer.label, device_id);

            self.record(&timer, Termination::Expired, &mut outcome);
            outcome
                .effects
                .push(DeviceRequest::new(device_id, &timer.label, DeviceCommand::SwitchToHome));
            outcome.events.push(TimerEvent::TimerRemoved {
                device_id: device_id.clone(),
                reason: RemovalReason::Expired,
            });
        }

        if !expired.is_empty() {
            outcome.changed = true;
            self.persist_timers(&mut outcome);
        }

        let any_active = self.any_active();
        debug!("Tick: {} expired, active remaining: {}", expired.len(), any_active);
        TickOutcome {
            expired,
            any_active,
            outcome,
        }
    }
}
