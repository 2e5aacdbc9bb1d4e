//! Completed usage session record

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of one finished timer lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSession {
    pub id: String,
    pub device_id: String,
    pub device_label: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_minutes: u32,
}

impl CompletedSession {
    /// Build a session ending at `completed_at`; the start is derived from the duration
    pub fn ending_at(
        device_id: &str,
        device_label: &str,
        duration_minutes: u32,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let duration_minutes = duration_minutes.max(1);
        Self {
            id: format!("{}-{}", device_id, completed_at.timestamp_millis()),
            device_id: device_id.to_string(),
            device_label: device_label.to_string(),
            started_at: completed_at - Duration::minutes(i64::from(duration_minutes)),
            completed_at,
            duration_minutes,
        }
    }
}

/// Persisted analytics history, append-only from the engine's side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHistory {
    pub sessions: Vec<CompletedSession>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn start_is_derived_from_duration() {
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        let session = CompletedSession::ending_at("tv1", "Living Room", 25, end);
        assert_eq!(session.started_at, Utc.with_ymd_and_hms(2024, 5, 1, 19, 35, 0).unwrap());
        assert_eq!(session.id, format!("tv1-{}", end.timestamp_millis()));
        assert!(session.completed_at >= session.started_at);
    }

    #[test]
    fn duration_is_at_least_one_minute() {
        let session = CompletedSession::ending_at("tv1", "L", 0, Utc::now());
        assert_eq!(session.duration_minutes, 1);
    }

    #[test]
    fn timestamps_serialize_as_iso_strings() {
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        let json = serde_json::to_value(CompletedSession::ending_at("tv1", "L", 2, end)).unwrap();
        assert_eq!(json["completedAt"], "2024-05-01T20:00:00Z");
        assert_eq!(json["startedAt"], "2024-05-01T19:58:00Z");
        assert_eq!(json["durationMinutes"], 2);
    }
}
