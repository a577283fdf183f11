//! Outbound device events.
//!
//! [`CaretakerDevice`](super::device::CaretakerDevice) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on
//! the other side decide what to do with them (serial log, diagnostics
//! UART, test recorder).

use crate::app::ports::{StorageError, TransportError};
use crate::error::ProtocolError;
use crate::fsm::StateId;

/// Structured events emitted by the connectivity core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The device has started (carries the initial state).
    Started(StateId),

    /// The state machine moved between states.
    StateChanged { from: StateId, to: StateId },

    /// The persistent store was erased by the button gesture.
    FactoryResetPerformed,

    /// The module was switched to access point mode.
    PairingStarted,

    /// The pairing app connected and received the self-description.
    PairingAppConnected,

    /// All configuration fields were received and persisted.
    ConfigReceived,

    /// Provisioning input was missing, empty or late.
    ConfigAborted,

    /// The server answered the broadcast.
    ServerDiscovered { address: heapless::String<15> },

    /// A registration request went out (1-based attempt counter).
    RegistrationSent { attempt: u32 },

    /// The server accepted the registration.
    Registered,

    /// Keepalive ping sent while operational.
    PingSent,

    /// The far end answered a ping.
    PongReceived,

    /// A module command batch failed; the step is retried.
    ModuleError { state: StateId, error: TransportError },

    /// The persistent store rejected a read or write.
    StorageFailed(StorageError),

    /// An inbound message could not be decoded.
    MalformedMessage(ProtocolError),
}
