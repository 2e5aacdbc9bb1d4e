//! Configuration and CLI argument handling

use std::path::PathBuf;
use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "tv-timer")]
#[command(about = "A state-managed HTTP server for per-TV countdown timers and usage analytics")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20560")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Directory holding persisted timers and analytics
    #[arg(short, long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Program invoked as `<program> <device_id> <command> [arg]` to control TVs.
    /// Commands are only logged when unset.
    #[arg(long)]
    pub device_command: Option<PathBuf>,

    /// Input source the TV switches to when a timer is extended
    #[arg(long, default_value = "HDMI1")]
    pub extend_input: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
