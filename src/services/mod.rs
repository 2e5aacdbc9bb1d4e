//! External service module
//!
//! The device-control boundary and the dispatcher that calls it without
//! blocking timer state changes.

pub mod device;
pub mod effects;

// Re-export main types
pub use device::{
    DeviceCommand, DeviceController, DeviceError, DeviceRequest, DryRunController, InputSource,
    ProgramController,
};
pub use effects::{dispatch_effects, send_request, DeviceQueues};
