//! Persisted analytics history

use std::sync::Arc;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Storage, StorageError, ANALYTICS_KEY};
use crate::state::{CompletedSession, SessionHistory};

/// What happened while loading the persisted history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryReport {
    /// Sessions loaded intact
    pub loaded: usize,
    /// Entries that could not be parsed and were dropped
    pub discarded: usize,
    /// Set when the whole blob was unreadable and treated as empty
    pub corrupt: Option<String>,
}

/// Append-only list of completed sessions plus its persistence
pub struct HistoryStore {
    storage: Arc<dyn Storage>,
    history: SessionHistory,
}

impl HistoryStore {
    /// Load the history, keeping every readable session. An unreadable blob
    /// yields an empty history.
    pub fn load(storage: Arc<dyn Storage>) -> (Self, HistoryReport) {
        let (history, report) = match storage.read(ANALYTICS_KEY) {
            Ok(Some(blob)) => parse_history(&blob),
            Ok(None) => {
                debug!("No persisted analytics history found");
                (SessionHistory::default(), HistoryReport::default())
            }
            Err(e) => (
                SessionHistory::default(),
                HistoryReport {
                    corrupt: Some(e.to_string()),
                    ..HistoryReport::default()
                },
            ),
        };
        if let Some(corrupt) = &report.corrupt {
            warn!("Analytics history unreadable, starting empty: {}", corrupt);
        } else {
            info!(
                "Loaded analytics history: {} sessions, {} discarded",
                report.loaded, report.discarded
            );
        }
        (Self { storage, history }, report)
    }

    pub fn sessions(&self) -> &[CompletedSession] {
        &self.history.sessions
    }

    pub fn push(&mut self, session: CompletedSession) {
        self.history.sessions.push(session);
    }

    pub fn clear(&mut self) {
        self.history.sessions.clear();
    }

    pub fn save(&self) -> Result<(), StorageError> {
        let blob = serde_json::to_string(&self.history)?;
        self.storage.write(ANALYTICS_KEY, &blob)
    }
}

fn parse_history(blob: &str) -> (SessionHistory, HistoryReport) {
    let mut report = HistoryReport::default();
    let mut history = SessionHistory::default();

    let value: Value = match serde_json::from_str(blob) {
        Ok(value) => value,
        Err(e) => {
            report.corrupt = Some(e.to_string());
            return (history, report);
        }
    };
    let Some(Value::Array(entries)) = value.get("sessions").cloned() else {
        report.corrupt = Some("analytics data has no sessions list".to_string());
        return (history, report);
    };

    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<CompletedSession>(entry) {
            Ok(session) => history.sessions.push(session),
            Err(e) => {
                warn!("Discarding unreadable session #{}: {}", index, e);
                report.discarded += 1;
            }
        }
    }
    report.loaded = history.sessions.len();
    (history, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::Utc;

    #[test]
    fn appended_sessions_survive_reload() {
        let storage = Arc::new(MemoryStorage::new());
        let (mut store, report) = HistoryStore::load(storage.clone());
        assert_eq!(report, HistoryReport::default());
        store.push(CompletedSession::ending_at("tv1", "L", 3, Utc::now()));
        store.save().unwrap();

        let (reloaded, _) = HistoryStore::load(storage);
        assert_eq!(reloaded.sessions().len(), 1);
        assert_eq!(reloaded.sessions()[0].duration_minutes, 3);
    }

    #[test]
    fn wrong_shape_is_reported_and_empty() {
        let storage = MemoryStorage::new();
        storage.insert_raw(ANALYTICS_KEY, r#"{"items":[]}"#);
        let (store, report) = HistoryStore::load(Arc::new(storage));
        assert!(store.sessions().is_empty());
        assert!(report.corrupt.is_some());
    }

    #[test]
    fn garbage_is_reported_and_empty() {
        let storage = MemoryStorage::new();
        storage.insert_raw(ANALYTICS_KEY, "][");
        let (store, report) = HistoryStore::load(Arc::new(storage));
        assert!(store.sessions().is_empty());
        assert!(report.corrupt.is_some());
    }

    #[test]
    fn unreadable_entries_are_dropped_individually() {
        let storage = Arc::new(MemoryStorage::new());
        let good = serde_json::to_value(CompletedSession::ending_at("tv1", "L", 5, Utc::now())).unwrap();
        let blob = serde_json::json!({
            "sessions": [good.clone(), good, {"id": "x", "deviceId": "tv2"}]
        });
        storage.insert_raw(ANALYTICS_KEY, &blob.to_string());

        let (mut store, report) = HistoryStore::load(storage.clone());
        assert_eq!(report.loaded, 2);
        assert_eq!(report.discarded, 1);
        assert!(report.corrupt.is_none());

        store.push(CompletedSession::ending_at("tv3", "L", 1, Utc::now()));
        store.save().unwrap();
        let (reloaded, report) = HistoryStore::load(storage);
        assert_eq!(reloaded.sessions().len(), 3);
        assert_eq!(report.discarded, 0);
    }
}
