//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use chrono::Utc;
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::{
    analytics::{filter_sessions, summarize, SessionFilter, UsageSummary},
    engine::{Outcome, TimerError},
    services::DeviceCommand,
    state::{AppState, CompletedSession},
};
use super::responses::{
    ApiResponse, CommandRequest, CommandResponse, ExtendRequest, HealthResponse, StartRequest,
    StatusResponse, TimerView,
};

type ApiError = (StatusCode, Json<ApiResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn reject(e: TimerError) -> ApiError {
    let status = match e {
        TimerError::StateUnavailable(_) => {
            error!("{}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => {
            warn!("Rejected timer action: {}", e);
            StatusCode::BAD_REQUEST
        }
    };
    (status, Json(ApiResponse::error(e.to_string())))
}

fn not_found(device_id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error(format!("No timer for device {}", device_id))),
    )
}

fn view(state: &AppState, outcome: &Outcome) -> Option<TimerView> {
    let now_ms = state.now_ms().unwrap_or_else(|_| Utc::now().timestamp_millis());
    outcome.timer.clone().map(|timer| TimerView::new(timer, now_ms))
}

/// Handle GET /timers - List all timers
pub async fn list_timers_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<TimerView>> {
    let timers = state.get_timers().map_err(reject)?;
    let now_ms = state.now_ms().map_err(reject)?;
    Ok(Json(TimerView::all(timers, now_ms)))
}

/// Handle POST /timers/:device_id/start - Start or restart a timer
pub async fn start_handler(
    Path(device_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> ApiResult<ApiResponse> {
    let outcome = state
        .start_timer(&device_id, &request.label, request.minutes)
        .map_err(reject)?;
    info!("Start endpoint called for {}", device_id);
    Ok(Json(ApiResponse::active(
        format!("Timer set for {} minutes", request.minutes),
        view(&state, &outcome),
    )))
}

/// Handle POST /timers/:device_id/pause - Pause a running timer
pub async fn pause_handler(
    Path(device_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<ApiResponse> {
    let outcome = state.pause_timer(&device_id).map_err(reject)?;
    if outcome.timer.is_none() {
        return Err(not_found(&device_id));
    }
    let response = if outcome.changed {
        ApiResponse::inactive("Timer paused".to_string(), view(&state, &outcome))
    } else {
        ApiResponse::unchanged("Timer already paused".to_string(), view(&state, &outcome))
    };
    Ok(Json(response))
}

/// Handle POST /timers/:device_id/resume - Resume a paused timer
pub async fn resume_handler(
    Path(device_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<ApiResponse> {
    let outcome = state.resume_timer(&device_id).map_err(reject)?;
    if outcome.timer.is_none() {
        return Err(not_found(&device_id));
    }
    let response = if outcome.changed {
        ApiResponse::active("Timer resumed".to_string(), view(&state, &outcome))
    } else {
        ApiResponse::unchanged("Timer already running".to_string(), view(&state, &outcome))
    };
    Ok(Json(response))
}

/// Handle POST /timers/:device_id/stop - Stop a timer and record usage
pub async fn stop_handler(
    Path(device_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<ApiResponse> {
    let outcome = state.stop_timer(&device_id).map_err(reject)?;
    if !outcome.changed {
        return Err(not_found(&device_id));
    }
    let message = match outcome.recorded_sessions().next() {
        Some(session) => format!("Timer stopped, {} minutes recorded", session.duration_minutes),
        None => "Timer stopped, no usage recorded".to_string(),
    };
    Ok(Json(ApiResponse::inactive(message, None)))
}

/// Handle POST /timers/:device_id/extend - Add minutes to a timer
pub async fn extend_handler(
    Path(device_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExtendRequest>,
) -> ApiResult<ApiResponse> {
    let outcome = state
        .extend_timer(&device_id, request.minutes)
        .map_err(reject)?;
    if outcome.timer.is_none() {
        return Err(not_found(&device_id));
    }
    Ok(Json(ApiResponse::active(
        format!("Timer extended by {} minutes", request.minutes),
        view(&state, &outcome),
    )))
}

/// Handle POST /timers/reload - Re-read timers written by another instance
pub async fn reload_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<TimerView>> {
    state.reload_timers().map_err(reject)?;
    list_timers_handler(State(state)).await
}

/// Handle POST /devices/:device_id/command - Pass-through device command
pub async fn command_handler(
    Path(device_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> ApiResult<CommandResponse> {
    let command: DeviceCommand = request.command.parse().map_err(|e| {
        warn!("Rejected device command {:?}: {}", request.command, e);
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("{}", e))),
        )
    })?;

    let name = command.to_string();
    if !state.send_command(&device_id, command).await {
        return Err((
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::error(format!("Device {} did not accept {}", device_id, name))),
        ));
    }

    Ok(Json(CommandResponse {
        status: "sent".to_string(),
        device_id,
        command: name,
        timestamp: Utc::now(),
    }))
}

/// Handle GET /sessions - Recorded sessions, optionally filtered
pub async fn sessions_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SessionFilter>,
) -> ApiResult<Vec<CompletedSession>> {
    let sessions = state.get_sessions().map_err(reject)?;
    let filtered = filter_sessions(&sessions, &filter, Utc::now())
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(filtered))
}

/// Handle DELETE /sessions - Clear the analytics history
pub async fn clear_sessions_handler(State(state): State<Arc<AppState>>) -> ApiResult<ApiResponse> {
    state.clear_history().map_err(reject)?;
    Ok(Json(ApiResponse::inactive("Analytics history cleared".to_string(), None)))
}

/// Handle GET /analytics/summary - Aggregated usage
pub async fn summary_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SessionFilter>,
) -> ApiResult<UsageSummary> {
    let sessions = state.get_sessions().map_err(reject)?;
    let filtered = filter_sessions(&sessions, &filter, Utc::now());
    Ok(Json(summarize(&filtered)))
}

/// Handle GET /events - Server-sent timer events
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();
    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse = Event::default()
                        .event(event.name())
                        .json_data(&event)
                        .unwrap_or_else(|e| {
                            warn!("Failed to encode event: {}", e);
                            Event::default().event(event.name())
                        });
                    return Some((Ok(sse), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handle GET /status - Return current server status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> ApiResult<StatusResponse> {
    let timers = state.get_timers().map_err(reject)?;
    let recorded_sessions = state.get_sessions().map_err(reject)?.len();
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timers: timers.len(),
        active_timers: timers.values().filter(|timer| timer.is_active).count(),
        driver_armed: state.scheduler.is_armed(),
        recorded_sessions,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
        notices: state.get_notices(),
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
