//! Fire-and-forget dispatch of device commands

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Weak},
};
use tokio::sync::mpsc::{self, error::SendError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

use super::device::DeviceRequest;
use crate::state::{AppState, TimerEvent};

/// One ordered command queue per device, each drained by its own task.
///
/// Commands for the same device are sent in the order the actions produced
/// them; different devices do not wait on each other.
#[derive(Debug, Default)]
pub struct DeviceQueues {
    senders: Mutex<HashMap<String, UnboundedSender<DeviceRequest>>>,
}

impl DeviceQueues {
    pub fn new() -> Self {
        Self::default()
    }

    fn enqueue(&self, state: &Arc<AppState>, request: DeviceRequest) {
        let mut senders = match self.senders.lock() {
            Ok(senders) => senders,
            Err(e) => {
                error!("Device queues unavailable, dropping {}: {}", request.command, e);
                return;
            }
        };

        let request = match senders.get(&request.device_id) {
            Some(queue) => match queue.send(request) {
                Ok(()) => return,
                // Worker is gone; start a new one below
                Err(SendError(request)) => request,
            },
            None => request,
        };

        debug!("Starting command queue for {}", request.device_id);
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain_queue(Arc::downgrade(state), rx));
        let device_id = request.device_id.clone();
        if queue.send(request).is_ok() {
            senders.insert(device_id, queue);
        }
    }
}

async fn drain_queue(state: Weak<AppState>, mut rx: UnboundedReceiver<DeviceRequest>) {
    while let Some(request) = rx.recv().await {
        let Some(state) = state.upgrade() else {
            break;
        };
        send_request(&state, request).await;
    }
}

/// Queue each request behind earlier ones for the same device. Failures are
/// surfaced as notices and events; timer state is never rolled back.
pub fn dispatch_effects(state: &Arc<AppState>, requests: Vec<DeviceRequest>) {
    for request in requests {
        state.device_queues.enqueue(state, request);
    }
}

/// Send one request and report its outcome
pub async fn send_request(state: &AppState, request: DeviceRequest) -> bool {
    let component = format!("device:{}", request.device_id);
    match state.devices.send(&request.device_id, &request.command).await {
        Ok(()) => {
            info!("Sent {} to {}", request.command, request.label);
            state.clear_notices_for(&component);
            true
        }
        Err(e) => {
            let message = format!("Failed to send {} to {}: {}", request.command, request.label, e);
            error!("{}", message);
            state.add_notice(&component, message);
            state.publish(TimerEvent::DeviceCommandFailed {
                device_id: request.device_id.clone(),
                command: request.command.to_string(),
                error: e.to_string(),
            });
            false
        }
    }
}
