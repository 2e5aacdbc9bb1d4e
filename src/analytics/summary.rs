//! Aggregations for the analytics view

use std::collections::BTreeMap;
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::state::CompletedSession;

/// Which sessions to aggregate
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionFilter {
    /// Only this device
    pub device: Option<String>,
    /// Only sessions completed within the last N days
    pub days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsage {
    /// `YYYY-MM-DD`, UTC
    pub date: String,
    pub count: u32,
    pub total_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUsage {
    pub device_id: String,
    pub label: String,
    pub count: u32,
    pub total_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyUsage {
    pub hour: u32,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub total_sessions: usize,
    pub total_devices: usize,
    pub total_minutes: u64,
    pub average_session_minutes: u64,
    pub daily: Vec<DailyUsage>,
    pub devices: Vec<DeviceUsage>,
    pub hourly: Vec<HourlyUsage>,
}

pub fn filter_sessions<'a>(
    sessions: &'a [CompletedSession],
    filter: &SessionFilter,
    now: DateTime<Utc>,
) -> Vec<&'a CompletedSession> {
    // A window reaching past the earliest representable time has no lower bound
    let since = filter
        .days
        .and_then(|days| Duration::try_days(i64::from(days)))
        .and_then(|window| now.checked_sub_signed(window));
    sessions
        .iter()
        .filter(|session| since.map_or(true, |since| session.completed_at >= since))
        .filter(|session| filter.device.as_deref().map_or(true, |device| session.device_id == device))
        .collect()
}

pub fn summarize(sessions: &[&CompletedSession]) -> UsageSummary {
    let total_minutes: u64 = sessions.iter().map(|s| u64::from(s.duration_minutes)).sum();
    let average_session_minutes = if sessions.is_empty() {
        0
    } else {
        (total_minutes as f64 / sessions.len() as f64).round() as u64
    };

    let mut daily: BTreeMap<String, DailyUsage> = BTreeMap::new();
    let mut devices: BTreeMap<&str, DeviceUsage> = BTreeMap::new();
    let mut hourly: Vec<HourlyUsage> = (0..24).map(|hour| HourlyUsage { hour, count: 0 }).collect();

    for session in sessions {
        let minutes = u64::from(session.duration_minutes);

        let date = session.completed_at.format("%Y-%m-%d").to_string();
        let day = daily.entry(date.clone()).or_insert_with(|| DailyUsage {
            date,
            count: 0,
            total_minutes: 0,
        });
        day.count += 1;
        day.total_minutes += minutes;

        // First label seen wins; labels are captured at start and may be stale
        let device = devices.entry(session.device_id.as_str()).or_insert_with(|| DeviceUsage {
            device_id: session.device_id.clone(),
            label: session.device_label.clone(),
            count: 0,
            total_minutes: 0,
        });
        device.count += 1;
        device.total_minutes += minutes;

        hourly[session.started_at.hour() as usize].count += 1;
    }

    let mut devices: Vec<DeviceUsage> = devices.into_values().collect();
    devices.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.device_id.cmp(&b.device_id)));

    UsageSummary {
        total_sessions: sessions.len(),
        total_devices: devices.len(),
        total_minutes,
        average_session_minutes,
        daily: daily.into_values().collect(),
        devices,
        hourly,
    }
}
