//! Timer state transitions
//!
//! Each function applies one action to the timer map and nothing else: no
//! persistence, no device commands, no session recording. The engine wraps
//! them with those side effects.

use super::error::{Result, TimerError};
use crate::state::{Timer, TimerMap};

/// Result of an action that may legitimately do nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The timer changed; holds its new state
    Changed(Timer),
    /// The timer exists but was already in the requested state
    Unchanged(Timer),
    /// No timer for that device
    Absent,
}

pub fn validate_device_id(device_id: &str) -> Result<()> {
    if device_id.trim().is_empty() {
        return Err(TimerError::InvalidDeviceId);
    }
    Ok(())
}

pub fn validate_minutes(minutes: i64) -> Result<u32> {
    u32::try_from(minutes)
        .ok()
        .filter(|m| *m >= 1)
        .ok_or(TimerError::InvalidDuration(minutes))
}

/// Start a fresh timer, replacing any existing one for the device.
/// Returns the new timer and the replaced one, if any.
pub fn start(
    timers: &mut TimerMap,
    device_id: &str,
    label: &str,
    minutes: i64,
    now_ms: i64,
) -> Result<(Timer, Option<Timer>)> {
    validate_device_id(device_id)?;
    let minutes = validate_minutes(minutes)?;
    let label = if label.trim().is_empty() { device_id } else { label };

    let timer = Timer::started(device_id, label, minutes, now_ms);
    let replaced = timers.insert(device_id.to_string(), timer.clone());
    Ok((timer, replaced))
}

/// Freeze an active timer; no-op when paused or absent
pub fn pause(timers: &mut TimerMap, device_id: &str) -> Applied {
    match timers.get_mut(device_id) {
        Some(timer) if timer.is_active => {
            timer.pause();
            Applied::Changed(timer.clone())
        }
        Some(timer) => Applied::Unchanged(timer.clone()),
        None => Applied::Absent,
    }
}

/// Restart a paused timer; no-op when active or absent
pub fn resume(timers: &mut TimerMap, device_id: &str, now_ms: i64) -> Applied {
    match timers.get_mut(device_id) {
        Some(timer) if !timer.is_active => {
            timer.activate(now_ms);
            Applied::Changed(timer.clone())
        }
        Some(timer) => Applied::Unchanged(timer.clone()),
        None => Applied::Absent,
    }
}

/// Remove a timer, returning it for session recording
pub fn stop(timers: &mut TimerMap, device_id: &str) -> Option<Timer> {
    timers.remove(device_id)
}

/// Add minutes to a timer and force it active. `Ok(None)` when absent.
pub fn extend(
    timers: &mut TimerMap,
    device_id: &str,
    minutes: i64,
    now_ms: i64,
) -> Result<Option<Timer>> {
    let minutes = u32::try_from(minutes)
        .ok()
        .filter(|m| *m >= 1)
        .ok_or(TimerError::InvalidExtension(minutes))?;

    let Some(timer) = timers.get_mut(device_id) else {
        return Ok(None);
    };
    timer.remaining_seconds += u64::from(minutes) * 60;
    timer.original_duration_minutes = timer.original_duration_minutes.saturating_add(minutes);
    timer.activate(now_ms);
    Ok(Some(timer.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_000_000;

    fn with_timer(minutes: i64) -> TimerMap {
        let mut timers = TimerMap::new();
        start(&mut timers, "tv1", "L", minutes, NOW).unwrap();
        timers
    }

    #[test]
    fn start_rejects_bad_arguments() {
        let mut timers = TimerMap::new();
        assert_eq!(start(&mut timers, "tv1", "L", 0, NOW), Err(TimerError::InvalidDuration(0)));
        assert_eq!(start(&mut timers, "tv1", "L", -5, NOW), Err(TimerError::InvalidDuration(-5)));
        assert_eq!(start(&mut timers, " ", "L", 5, NOW), Err(TimerError::InvalidDeviceId));
        assert!(timers.is_empty());
    }

    #[test]
    fn start_overwrites_and_returns_previous() {
        let mut timers = with_timer(10);
        let (timer, replaced) = start(&mut timers, "tv1", "", 20, NOW).unwrap();
        assert_eq!(replaced.unwrap().original_duration_minutes, 10);
        assert_eq!(timer.original_duration_minutes, 20);
        assert_eq!(timer.label, "tv1");
    }

    #[test]
    fn pause_is_idempotent() {
        let mut timers = with_timer(10);
        let first = pause(&mut timers, "tv1");
        let after_first = timers.clone();
        let second = pause(&mut timers, "tv1");
        assert!(matches!(first, Applied::Changed(_)));
        assert!(matches!(second, Applied::Unchanged(_)));
        assert_eq!(timers, after_first);
    }

    #[test]
    fn pause_and_resume_on_absent_timer_are_noops() {
        let mut timers = TimerMap::new();
        assert_eq!(pause(&mut timers, "tv9"), Applied::Absent);
        assert_eq!(resume(&mut timers, "tv9", NOW), Applied::Absent);
        assert!(timers.is_empty());
    }

    #[test]
    fn resume_recomputes_end_time_from_remaining() {
        let mut timers = with_timer(10);
        timers.get_mut("tv1").unwrap().remaining_seconds = 400;
        pause(&mut timers, "tv1");
        let Applied::Changed(timer) = resume(&mut timers, "tv1", NOW + 60_000) else {
            panic!("resume should change a paused timer");
        };
        assert!(timer.is_active);
        assert_eq!(timer.end_time, Some(NOW + 60_000 + 400_000));
    }

    #[test]
    fn extend_while_paused_resumes() {
        let mut timers = with_timer(10);
        pause(&mut timers, "tv1");
        let timer = extend(&mut timers, "tv1", 5, NOW).unwrap().unwrap();
        assert!(timer.is_active);
        assert_eq!(timer.remaining_seconds, 900);
        assert_eq!(timer.original_duration_minutes, 15);
        assert!(timer.is_consistent());
    }

    #[test]
    fn extend_validates_and_ignores_absent() {
        let mut timers = with_timer(10);
        assert_eq!(extend(&mut timers, "tv1", 0, NOW), Err(TimerError::InvalidExtension(0)));
        assert_eq!(extend(&mut timers, "tv2", 5, NOW), Ok(None));
        assert_eq!(timers["tv1"].original_duration_minutes, 10);
    }

    #[test]
    fn stop_removes() {
        let mut timers = with_timer(10);
        assert!(stop(&mut timers, "tv1").is_some());
        assert!(stop(&mut timers, "tv1").is_none());
    }
}
