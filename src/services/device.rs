//! Device-control boundary
//!
//! The engine only ever asks for a small, closed set of commands. Anything
//! coming from the dashboard as a string is parsed into [`DeviceCommand`]
//! before it gets anywhere near a device.

use std::{fmt, path::PathBuf, str::FromStr};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Errors from parsing or sending device commands
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Unknown device command: {0}")]
    UnknownCommand(String),

    #[error("Invalid input source: {0:?}")]
    InvalidInput(String),

    #[error("Failed to run device command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Device command failed: {0}")]
    Rejected(String),
}

/// Validated input source name, e.g. `HDMI1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InputSource(String);

impl InputSource {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InputSource {
    type Error = DeviceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let valid = !value.is_empty()
            && value.len() <= 32
            && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(value))
        } else {
            Err(DeviceError::InvalidInput(value))
        }
    }
}

impl From<InputSource> for String {
    fn from(input: InputSource) -> Self {
        input.0
    }
}

impl FromStr for InputSource {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

/// Commands the service can send to a TV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceCommand {
    PowerOn,
    PowerOff,
    SwitchToHome,
    SwitchToExtendInput,
    SetInput(InputSource),
    Mute,
    Unmute,
    VolumeUp,
    VolumeDown,
}

impl DeviceCommand {
    /// Command name and optional argument as passed to the device API
    pub fn wire(&self, extend_input: &InputSource) -> (&'static str, Option<String>) {
        match self {
            DeviceCommand::PowerOn => ("on", None),
            DeviceCommand::PowerOff => ("off", None),
            DeviceCommand::SwitchToHome => ("home", None),
            DeviceCommand::SwitchToExtendInput => ("setInputSource", Some(extend_input.as_str().to_string())),
            DeviceCommand::SetInput(input) => ("setInputSource", Some(input.as_str().to_string())),
            DeviceCommand::Mute => ("mute", None),
            DeviceCommand::Unmute => ("unmute", None),
            DeviceCommand::VolumeUp => ("volumeUp", None),
            DeviceCommand::VolumeDown => ("volumeDown", None),
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCommand::PowerOn => write!(f, "powerOn"),
            DeviceCommand::PowerOff => write!(f, "powerOff"),
            DeviceCommand::SwitchToHome => write!(f, "home"),
            DeviceCommand::SwitchToExtendInput => write!(f, "extend"),
            DeviceCommand::SetInput(input) => write!(f, "input:{}", input.as_str()),
            DeviceCommand::Mute => write!(f, "mute"),
            DeviceCommand::Unmute => write!(f, "unmute"),
            DeviceCommand::VolumeUp => write!(f, "volumeUp"),
            DeviceCommand::VolumeDown => write!(f, "volumeDown"),
        }
    }
}

impl FromStr for DeviceCommand {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(input) = s.strip_prefix("input:") {
            return Ok(DeviceCommand::SetInput(input.parse()?));
        }
        match s {
            "on" | "powerOn" => Ok(DeviceCommand::PowerOn),
            "off" | "powerOff" => Ok(DeviceCommand::PowerOff),
            "home" => Ok(DeviceCommand::SwitchToHome),
            "extend" => Ok(DeviceCommand::SwitchToExtendInput),
            "mute" => Ok(DeviceCommand::Mute),
            "unmute" => Ok(DeviceCommand::Unmute),
            "volumeUp" => Ok(DeviceCommand::VolumeUp),
            "volumeDown" => Ok(DeviceCommand::VolumeDown),
            other => Err(DeviceError::UnknownCommand(other.to_string())),
        }
    }
}

/// A command the engine wants sent, with the label for user-facing messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    pub device_id: String,
    pub label: String,
    pub command: DeviceCommand,
}

impl DeviceRequest {
    pub fn new(device_id: &str, label: &str, command: DeviceCommand) -> Self {
        Self {
            device_id: device_id.to_string(),
            label: label.to_string(),
            command,
        }
    }
}

/// Capability to control a physical device
pub trait DeviceController: Send + Sync {
    fn send<'a>(&'a self, device_id: &'a str, command: &'a DeviceCommand) -> BoxFuture<'a, Result<(), DeviceError>>;
}

/// Controller that runs an external program per command:
/// `<program> <device_id> <command> [argument]`
#[derive(Debug, Clone)]
pub struct ProgramController {
    program: PathBuf,
    extend_input: InputSource,
}

impl ProgramController {
    pub fn new(program: impl Into<PathBuf>, extend_input: InputSource) -> Self {
        Self {
            program: program.into(),
            extend_input,
        }
    }
}

impl DeviceController for ProgramController {
    fn send<'a>(&'a self, device_id: &'a str, command: &'a DeviceCommand) -> BoxFuture<'a, Result<(), DeviceError>> {
        Box::pin(async move {
            let (name, arg) = command.wire(&self.extend_input);
            debug!("Sending {} to {} via {}", name, device_id, self.program.display());

            let mut cmd = Command::new(&self.program);
            cmd.arg(device_id).arg(name);
            if let Some(arg) = arg {
                cmd.arg(arg);
            }
            let output = cmd.output().await?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(DeviceError::Rejected(format!("{} {}: {}", name, device_id, stderr.trim())));
            }

            info!("Device {} accepted {}", device_id, name);
            Ok(())
        })
    }
}

/// Controller that only logs; used when no device program is configured
#[derive(Debug, Clone)]
pub struct DryRunController {
    extend_input: InputSource,
}

impl DryRunController {
    pub fn new(extend_input: InputSource) -> Self {
        Self { extend_input }
    }
}

impl DeviceController for DryRunController {
    fn send<'a>(&'a self, device_id: &'a str, command: &'a DeviceCommand) -> BoxFuture<'a, Result<(), DeviceError>> {
        Box::pin(async move {
            let (name, arg) = command.wire(&self.extend_input);
            info!("[dry-run] {} -> {} {}", device_id, name, arg.unwrap_or_default());
            Ok(())
        })
    }
}
