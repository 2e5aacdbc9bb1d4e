//! Shared countdown scheduler

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::debug;

/// Arm/disarm switch for the single countdown driver.
///
/// Actions arm it whenever a timer becomes active; the driver disarms it when
/// a tick finds nothing left to count down, then parks until the next arm.
#[derive(Debug, Default)]
pub struct Scheduler {
    armed: AtomicBool,
    wake: Notify,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request ticking; no-op when already armed
    pub fn arm(&self) {
        if !self.armed.swap(true, Ordering::SeqCst) {
            debug!("Countdown driver armed");
            self.wake.notify_one();
        }
    }

    pub fn disarm(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            debug!("Countdown driver disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Wait until the scheduler is armed
    pub async fn armed(&self) {
        loop {
            let notified = self.wake.notified();
            if self.is_armed() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn armed_returns_once_armed() {
        let scheduler = Arc::new(Scheduler::default());
        let waiter = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.armed().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        scheduler.arm();
        waiter.await.unwrap();
        assert!(scheduler.is_armed());
    }

    #[test]
    fn disarm_clears_flag() {
        let scheduler = Scheduler::default();
        scheduler.arm();
        scheduler.arm();
        scheduler.disarm();
        assert!(!scheduler.is_armed());
    }
}
