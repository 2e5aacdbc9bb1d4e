//! Countdown driver background task

use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::{engine::TICK_PERIOD, state::AppState};

/// Background task that ticks every active timer once per second.
///
/// Parks while the scheduler is disarmed and stops ticking as soon as a tick
/// reports that no timer is active.
pub async fn countdown_task(state: Arc<AppState>) {
    info!("Starting countdown driver task");

    loop {
        state.scheduler.armed().await;
        debug!("Countdown driver running");

        let mut ticker = interval(TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        // The first tick of a tokio interval completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match state.tick() {
                Ok(true) => {}
                Ok(false) => {
                    debug!("No active timers, countdown driver idle");
                    break;
                }
                Err(e) => {
                    error!("Countdown tick failed: {}", e);
                    state.scheduler.disarm();
                    break;
                }
            }
        }
    }
}
