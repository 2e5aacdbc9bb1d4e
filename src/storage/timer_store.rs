//! Persisted timer mapping with load-time reconciliation

use std::{collections::BTreeMap, sync::Arc};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Storage, StorageError, TIMERS_KEY};
use crate::{
    state::{Timer, TimerMap},
    utils::clock::to_remaining,
};

/// What happened while loading the persisted timers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Timers still counting down, end time recomputed
    pub restored: usize,
    /// Paused timers loaded as-is
    pub paused: usize,
    /// Device ids whose end time had already passed; dropped without a session
    pub expired: Vec<String>,
    /// Entries that could not be parsed or had no device id
    pub discarded: usize,
    /// Entries whose fields had to be repaired
    pub repaired: usize,
    /// Set when the whole blob was unreadable and treated as empty
    pub corrupt: Option<String>,
}

/// Live timer set plus its persistence
pub struct TimerStore {
    storage: Arc<dyn Storage>,
    timers: TimerMap,
}

impl TimerStore {
    /// Load persisted timers and reconcile them against `now_ms`
    pub fn load(storage: Arc<dyn Storage>, now_ms: i64) -> (Self, LoadReport) {
        let mut store = Self {
            storage,
            timers: TimerMap::new(),
        };
        let report = store.reload(now_ms);
        (store, report)
    }

    /// Re-read the persisted blob, replacing the in-memory set
    pub fn reload(&mut self, now_ms: i64) -> LoadReport {
        let raw = match self.storage.read(TIMERS_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!("No persisted timers found");
                self.timers.clear();
                return LoadReport::default();
            }
            Err(e) => {
                warn!("Failed to read persisted timers: {}", e);
                self.timers.clear();
                return LoadReport {
                    corrupt: Some(e.to_string()),
                    ..LoadReport::default()
                };
            }
        };

        let (timers, report) = reconcile(&raw, now_ms);
        info!(
            "Loaded timers: {} active, {} paused, {} expired, {} discarded",
            report.restored,
            report.paused,
            report.expired.len(),
            report.discarded
        );
        self.timers = timers;
        report
    }

    /// Write the full mapping
    pub fn save(&self) -> Result<(), StorageError> {
        let blob = serde_json::to_string(&self.timers)?;
        self.storage.write(TIMERS_KEY, &blob)
    }

    pub fn timers(&self) -> &TimerMap {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut TimerMap {
        &mut self.timers
    }

    pub fn get(&self, device_id: &str) -> Option<&Timer> {
        self.timers.get(device_id)
    }

    pub fn any_active(&self) -> bool {
        self.timers.values().any(|timer| timer.is_active)
    }
}

/// Parse a persisted blob and apply the load rules.
///
/// Future end times are restored as active with the remaining time recomputed;
/// past end times are dropped; entries without an end time load paused.
pub fn reconcile(blob: &str, now_ms: i64) -> (TimerMap, LoadReport) {
    let mut report = LoadReport::default();
    let mut timers = TimerMap::new();

    let entries: BTreeMap<String, Value> = match serde_json::from_str(blob) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Persisted timers are corrupt, starting empty: {}", e);
            report.corrupt = Some(e.to_string());
            return (timers, report);
        }
    };

    for (key, value) in entries {
        if key.trim().is_empty() {
            report.discarded += 1;
            continue;
        }
        let mut timer: Timer = match serde_json::from_value(value) {
            Ok(timer) => timer,
            Err(e) => {
                warn!("Discarding unreadable timer entry for {}: {}", key, e);
                report.discarded += 1;
                continue;
            }
        };

        let mut repaired = false;
        if timer.device_id != key {
            timer.device_id = key.clone();
            repaired = true;
        }

        match timer.end_time {
            Some(end) if end > now_ms && to_remaining(now_ms, end) > 0 => {
                timer.remaining_seconds = to_remaining(now_ms, end);
                timer.is_active = true;
                report.restored += 1;
            }
            Some(_) => {
                info!("Timer for {} expired while offline, dropping it", key);
                report.expired.push(key);
                continue;
            }
            None => {
                if timer.is_active {
                    timer.is_active = false;
                    repaired = true;
                }
                report.paused += 1;
            }
        }

        let needed_minutes = timer.remaining_seconds.div_ceil(60).max(1);
        if u64::from(timer.original_duration_minutes) < needed_minutes {
            timer.original_duration_minutes = u32::try_from(needed_minutes).unwrap_or(u32::MAX);
            repaired = true;
        }

        if repaired {
            report.repaired += 1;
        }
        timers.insert(key, timer);
    }

    (timers, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    const NOW: i64 = 1_700_000_000_000;

    fn store_with(blob: &str) -> (TimerStore, LoadReport) {
        let storage = MemoryStorage::new();
        storage.insert_raw(TIMERS_KEY, blob);
        TimerStore::load(Arc::new(storage), NOW)
    }

    #[test]
    fn future_end_time_is_restored_active() {
        let blob = format!(
            r#"{{"tv1":{{"deviceId":"tv1","label":"L","remainingSeconds":999,"isActive":false,"endTime":{},"originalDurationMinutes":30}}}}"#,
            NOW + 120_500
        );
        let (store, report) = store_with(&blob);
        let timer = store.get("tv1").unwrap();
        assert!(timer.is_active);
        assert_eq!(timer.remaining_seconds, 120);
        assert_eq!(report.restored, 1);
    }

    #[test]
    fn past_end_time_is_dropped() {
        let blob = format!(
            r#"{{"tv1":{{"deviceId":"tv1","label":"L","remainingSeconds":10,"isActive":true,"endTime":{},"originalDurationMinutes":1}}}}"#,
            NOW - 1
        );
        let (store, report) = store_with(&blob);
        assert!(store.timers().is_empty());
        assert_eq!(report.expired, vec!["tv1".to_string()]);
    }

    #[test]
    fn paused_timer_loads_as_is() {
        let blob = r#"{"tv1":{"deviceId":"tv1","label":"L","remainingSeconds":300,"isActive":false,"endTime":null,"originalDurationMinutes":10}}"#;
        let (store, report) = store_with(blob);
        let timer = store.get("tv1").unwrap();
        assert!(!timer.is_active);
        assert_eq!(timer.remaining_seconds, 300);
        assert_eq!(report.paused, 1);
        assert_eq!(report.repaired, 0);
    }

    #[test]
    fn inconsistent_and_legacy_entries_are_repaired() {
        let blob = r#"{"tv1":{"deviceId":"other","label":"L","remainingSeconds":125,"isActive":true,"endTime":null}}"#;
        let (store, report) = store_with(blob);
        let timer = store.get("tv1").unwrap();
        assert_eq!(timer.device_id, "tv1");
        assert!(!timer.is_active);
        assert_eq!(timer.original_duration_minutes, 3);
        assert!(timer.is_consistent());
        assert_eq!(report.repaired, 1);
    }

    #[test]
    fn corrupt_blob_is_empty_state() {
        let (store, report) = store_with("{not json");
        assert!(store.timers().is_empty());
        assert!(report.corrupt.is_some());
    }

    #[test]
    fn bad_entries_are_discarded_individually() {
        let blob = r#"{"tv1":{"label":5},"tv2":{"deviceId":"tv2","label":"L","remainingSeconds":60,"isActive":false,"endTime":null,"originalDurationMinutes":1}}"#;
        let (store, report) = store_with(blob);
        assert_eq!(report.discarded, 1);
        assert!(store.get("tv2").is_some());
    }

    #[test]
    fn save_then_load_is_stable() {
        let storage = Arc::new(MemoryStorage::new());
        let (mut store, _) = TimerStore::load(storage.clone(), NOW);
        store
            .timers_mut()
            .insert("tv1".into(), Timer::started("tv1", "L", 5, NOW));
        store.save().unwrap();

        let (first, _) = TimerStore::load(storage.clone(), NOW);
        let (second, _) = TimerStore::load(storage, NOW);
        assert_eq!(first.timers(), second.timers());
        assert_eq!(first.get("tv1").unwrap().remaining_seconds, 300);
    }
}
