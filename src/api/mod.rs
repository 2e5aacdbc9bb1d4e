//! HTTP API module
//!
//! Endpoints the dashboard uses to drive timers and read analytics.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers", get(list_timers_handler))
        .route("/timers/reload", post(reload_handler))
        .route("/timers/:device_id/start", post(start_handler))
        .route("/timers/:device_id/pause", post(pause_handler))
        .route("/timers/:device_id/resume", post(resume_handler))
        .route("/timers/:device_id/stop", post(stop_handler))
        .route("/timers/:device_id/extend", post(extend_handler))
        .route("/devices/:device_id/command", post(command_handler))
        .route("/sessions", get(sessions_handler).delete(clear_sessions_handler))
        .route("/analytics/summary", get(summary_handler))
        .route("/events", get(events_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
