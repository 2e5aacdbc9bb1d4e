//! TV Timer - A state-managed HTTP server for per-TV countdown timers
//!
//! This is the main entry point for the tv-timer application.

use std::sync::Arc;
use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use tv_timer::{
    api::create_router,
    config::Config,
    engine::TimerEngine,
    services::{DeviceController, DryRunController, InputSource, ProgramController},
    state::AppState,
    storage::FileStorage,
    tasks::{countdown_task, Scheduler},
    utils::{shutdown_signal, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("tv_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting tv-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, data_dir={}",
        config.host,
        config.port,
        config.data_dir.display()
    );

    let extend_input: InputSource = config
        .extend_input
        .parse()
        .with_context(|| format!("invalid --extend-input {:?}", config.extend_input))?;

    let devices: Arc<dyn DeviceController> = match &config.device_command {
        Some(program) => {
            info!("Device commands go through {}", program.display());
            Arc::new(ProgramController::new(program, extend_input))
        }
        None => {
            info!("No --device-command given, device commands will only be logged");
            Arc::new(DryRunController::new(extend_input))
        }
    };

    // Load persisted timers and analytics
    let storage = Arc::new(FileStorage::new(&config.data_dir));
    let (engine, report) = TimerEngine::load(storage, Arc::new(SystemClock));

    // Create application state
    let state = Arc::new(AppState::new(
        engine,
        devices,
        Scheduler::new(),
        config.port,
        config.host.clone(),
    ));
    state.report_startup(&report);

    // Start the countdown driver background task
    let driver_state = Arc::clone(&state);
    tokio::spawn(async move {
        countdown_task(driver_state).await;
    });

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /timers                     - List timers");
    info!("  POST   /timers/:id/start           - Start a timer {{label, minutes}}");
    info!("  POST   /timers/:id/pause|resume|stop");
    info!("  POST   /timers/:id/extend          - Extend a timer {{minutes}}");
    info!("  POST   /timers/reload              - Re-read persisted timers");
    info!("  POST   /devices/:id/command        - Send a device command {{command}}");
    info!("  GET    /sessions, DELETE /sessions - Analytics history");
    info!("  GET    /analytics/summary          - Aggregated usage");
    info!("  GET    /events                     - Server-sent events");
    info!("  GET    /status, /health");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
