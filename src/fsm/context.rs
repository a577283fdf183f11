//! Shared mutable context threaded through every FSM handler.
//!
//! `DeviceContext` is the single struct that state handlers read from
//! and write to: owned ports, the device adapter and its handlers,
//! per-state scratch (deadline, marker scanner, line buffer), the loaded
//! identity and the retained server address. Think of it as the
//! "blackboard" in a blackboard architecture.

use log::{debug, warn};

use crate::app::descriptor::{DeviceAdapter, DeviceDescriptor, HandlerTable};
use crate::app::events::DeviceEvent;
use crate::app::ports::{BoardPort, EventSink, ModulePort, Platform, Ports, TransportError};
use crate::config::DeviceConfig;
use crate::drivers::blink::{BlinkDriver, BlinkPattern};
use crate::identity::DeviceIdentity;
use crate::messenger::text::{self, TextDecoder};
use crate::messenger::{Command, Outbox, opcode};
use crate::transport::commands::HardwareAddress;
use crate::transport::scanner::{LineReader, MarkerScanner, OPEN_MARKER};

/// Longest line accepted from the pairing app or the broadcast response.
pub const LINE_MAX: usize = 128;

/// Dotted IPv4 address.
pub const SERVER_ADDRESS_MAX: usize = 15;

pub type ServerAddress = heapless::String<SERVER_ADDRESS_MAX>;

/// The shared context passed to every state handler function.
pub struct DeviceContext<P: Platform, A: DeviceAdapter> {
    // -- Timing --
    /// Clock reading taken once at the start of the current tick.
    pub now_ms: u64,
    /// Clock reading when the current state was entered.
    pub state_entered_ms: u64,
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    /// Deadline of the wait in progress (meaning depends on the state).
    pub deadline_ms: u64,

    // -- Collaborators --
    pub config: DeviceConfig,
    pub ports: Ports<P>,
    pub adapter: A,
    pub descriptor: DeviceDescriptor,
    pub handlers: HandlerTable<A>,

    // -- Provisioning --
    pub identity: Option<DeviceIdentity>,
    pub hardware_address: HardwareAddress,
    /// Configuration lines received so far (uuid, name, ssid, phrase).
    pub config_fields: heapless::Vec<heapless::String<LINE_MAX>, 4>,
    /// Set after a factory reset until the button is released.
    pub reset_latch: bool,

    // -- Pairing text protocol --
    pub scanner: MarkerScanner<'static>,
    pub line: LineReader<LINE_MAX>,
    /// A marker was matched and the line that follows is being read.
    pub marker_seen: bool,

    // -- Server --
    pub server_address: Option<ServerAddress>,
    pub registration_attempts: u32,
    pub registered: bool,
    pub next_ping_ms: u64,
    pub last_pong_ms: Option<u64>,

    // -- Messaging --
    pub decoder: TextDecoder,
    pub outbox: Outbox,

    // -- Feedback --
    pub blink: BlinkDriver,
}

impl<P: Platform, A: DeviceAdapter> DeviceContext<P, A> {
    pub fn new(config: DeviceConfig, ports: Ports<P>, adapter: A, handlers: HandlerTable<A>) -> Self {
        let descriptor = adapter.descriptor();
        Self {
            now_ms: 0,
            state_entered_ms: 0,
            ticks_in_state: 0,
            deadline_ms: 0,
            config,
            ports,
            adapter,
            descriptor,
            handlers,
            identity: None,
            hardware_address: HardwareAddress::new(),
            config_fields: heapless::Vec::new(),
            reset_latch: false,
            scanner: MarkerScanner::new(OPEN_MARKER),
            line: LineReader::new(),
            marker_seen: false,
            server_address: None,
            registration_attempts: 0,
            registered: false,
            next_ping_ms: 0,
            last_pong_ms: None,
            decoder: TextDecoder::new(),
            outbox: Outbox::new(),
            blink: BlinkDriver::new(),
        }
    }

    /// Arm the state's deadline `ms` from now.
    pub fn arm_deadline(&mut self, ms: u32) {
        self.deadline_ms = self.now_ms + u64::from(ms);
    }

    /// Deadline strictly passed.
    pub fn deadline_passed(&self) -> bool {
        self.now_ms > self.deadline_ms
    }

    /// Bytes a state may pull from the module during one tick.
    pub fn byte_budget(&self) -> usize {
        usize::from(self.config.max_bytes_per_tick)
    }

    /// Button is sampled only when the board has one.
    pub fn button_pressed(&mut self) -> bool {
        self.descriptor.button_pin.is_some() && self.ports.board.button_pressed()
    }

    pub fn set_blink(&mut self, pattern: Option<BlinkPattern>) {
        let level = self.blink.activate(pattern, self.now_ms);
        if self.descriptor.led_pin.is_some() {
            self.ports.board.set_led(level);
        }
    }

    pub fn emit(&mut self, event: DeviceEvent) {
        self.ports.sink.emit(&event);
    }

    /// Start watching for `marker`, forgetting any partial match.
    pub fn watch_for(&mut self, marker: &'static str) {
        self.scanner = MarkerScanner::new(marker);
        self.marker_seen = false;
        self.line.clear();
    }

    /// Pull up to one tick's budget of bytes looking for the watched
    /// marker. Bytes after the marker stay in the module.
    pub fn scan_for_marker(&mut self) -> bool {
        let budget = self.byte_budget();
        let module = &mut self.ports.module;
        self.scanner.scan(budget, || module.read_byte())
    }

    /// Encode and write one command to the module's data stream.
    pub fn send_command(&mut self, command: &Command) -> Result<(), TransportError> {
        if self.config.features.debug_logging {
            debug!("messenger > {:?}", command);
        }
        self.ports.module.write(&text::encode(command))
    }

    /// Write every reply queued by handlers. Send failures are logged;
    /// the link layer offers no retransmission.
    pub fn flush_outbox(&mut self) {
        let queued: Vec<Command> = self.outbox.drain().collect();
        for command in &queued {
            if let Err(e) = self.send_command(command) {
                warn!("messenger: reply {} dropped: {}", command.id, e);
            }
        }
    }

    /// Decode inbound bytes and route every complete command. Returns
    /// `true` as soon as a registration response is seen; the remaining
    /// bytes are left in the module for the next tick.
    pub fn pump_messages(&mut self) -> bool {
        let mut got_register_response = false;
        for _ in 0..self.byte_budget() {
            let Some(byte) = self.ports.module.read_byte() else {
                break;
            };
            match self.decoder.push(byte) {
                None => {}
                Some(Ok(command)) => {
                    if command.id == opcode::REGISTER_RESPONSE {
                        got_register_response = true;
                    } else {
                        self.route(&command);
                    }
                }
                Some(Err(e)) => {
                    warn!("messenger: dropped malformed message: {}", e);
                    self.emit(DeviceEvent::MalformedMessage(e));
                }
            }
            if got_register_response {
                break;
            }
        }
        self.flush_outbox();
        got_register_response
    }

    fn route(&mut self, command: &Command) {
        if self.config.features.debug_logging {
            debug!("messenger < {:?}", command);
        }
        match command.id {
            opcode::PING_REQUEST => self.outbox.send(Command::new(opcode::PING_RESPONSE)),
            opcode::PING_RESPONSE => {
                self.last_pong_ms = Some(self.now_ms);
                self.emit(DeviceEvent::PongReceived);
            }
            opcode::INVALID | opcode::REGISTER_REQUEST => {
                debug!("messenger: ignoring opcode {}", command.id);
            }
            _ => {
                self.handlers
                    .dispatch(&mut self.adapter, command, &mut self.outbox);
            }
        }
    }
}
