//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing device events to the logger
//! (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::DeviceEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`DeviceEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &DeviceEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            DeviceEvent::Started(state) => info!("START | initial_state={:?}", state),
            DeviceEvent::StateChanged { from, to } => info!("STATE | {:?} -> {:?}", from, to),
            DeviceEvent::FactoryResetPerformed => info!("RESET | identity erased"),
            DeviceEvent::PairingStarted => info!("PAIR  | access point up"),
            DeviceEvent::PairingAppConnected => info!("PAIR  | app connected"),
            DeviceEvent::ConfigReceived => info!("PAIR  | configuration stored"),
            DeviceEvent::ConfigAborted => warn!("PAIR  | configuration aborted"),
            DeviceEvent::ServerDiscovered { address } => info!("NET   | server at {}", address),
            DeviceEvent::RegistrationSent { attempt } => {
                info!("NET   | registration attempt {}", attempt);
            }
            DeviceEvent::Registered => info!("NET   | registered"),
            DeviceEvent::PingSent => info!("NET   | ping"),
            DeviceEvent::PongReceived => info!("NET   | pong"),
            DeviceEvent::ModuleError { state, error } => {
                warn!("FAULT | module error in {:?}: {}", state, error);
            }
            DeviceEvent::StorageFailed(e) => warn!("FAULT | storage: {}", e),
            DeviceEvent::MalformedMessage(e) => warn!("FAULT | malformed message: {}", e),
        }
    }
}
