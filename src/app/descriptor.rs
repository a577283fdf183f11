//! Device adapter contract.
//!
//! Every device firmware (switch, dimmer, sensor, ...) is a thin adapter
//! that describes itself with a [`DeviceDescriptor`] and plugs its
//! message handlers into the connectivity core through
//! [`DeviceAdapter`]. The three hooks have no-op defaults, so a device
//! only implements what it needs.

use log::debug;

use crate::error::ProtocolError;
use crate::messenger::{Command, Outbox, opcode};

/// Static facts about a device, announced while pairing and registering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub device_type: &'static str,
    pub description: &'static str,
    /// Status LED; `None` disables blink feedback.
    pub led_pin: Option<u8>,
    /// Provisioning button; `None` disables the factory reset gesture.
    pub button_pin: Option<u8>,
}

/// Handler for one application opcode. Replies go to the outbox.
pub type MessageHandler<A> = fn(&mut A, &Command, &mut Outbox);

/// Per-device behaviour plugged into the connectivity core.
pub trait DeviceAdapter: Sized {
    fn descriptor(&self) -> DeviceDescriptor;

    /// Attach handlers for the device's application opcodes. Called
    /// once from `CaretakerDevice::init`.
    fn register_message_handlers(
        &mut self,
        _handlers: &mut HandlerTable<Self>,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Append device-specific arguments to the registration request.
    fn registration_params(&self, _request: &mut Command) {}

    /// Called each time the device becomes operational.
    fn on_operational(&mut self, _out: &mut Outbox) {}
}

/// Maximum number of application opcodes one device can handle.
pub const MAX_HANDLERS: usize = 16;

/// Opcode → handler map owned by the device.
pub struct HandlerTable<A> {
    entries: heapless::Vec<(u8, MessageHandler<A>), MAX_HANDLERS>,
}

impl<A> Default for HandlerTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> HandlerTable<A> {
    pub fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Attach (or replace) the handler for `id`. Register and ping
    /// opcodes belong to the connectivity core and are rejected.
    pub fn attach(&mut self, id: u8, handler: MessageHandler<A>) -> Result<(), ProtocolError> {
        if opcode::is_reserved(id) {
            return Err(ProtocolError::ReservedOpcode(id));
        }
        if let Some(entry) = self.entries.iter_mut().find(|(op, _)| *op == id) {
            entry.1 = handler;
            return Ok(());
        }
        self.entries
            .push((id, handler))
            .map_err(|_| ProtocolError::HandlerTableFull)
    }

    /// Run the handler for `command`. Returns `false` when none is attached.
    pub fn dispatch(&self, adapter: &mut A, command: &Command, out: &mut Outbox) -> bool {
        match self.entries.iter().find(|(op, _)| *op == command.id) {
            Some((_, handler)) => {
                handler(adapter, command, out);
                true
            }
            None => {
                debug!("messenger: no handler for opcode {}", command.id);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
