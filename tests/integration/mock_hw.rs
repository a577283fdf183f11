//! Mock hardware for integration tests.
//!
//! The radio module is the real [`WiflyModule`] driver talking to
//! [`RnxvSim`], a byte-level simulation of an RN-XV in its default
//! configuration. Storage is the host backend of the real NVS adapter.
//! Everything else records what it was asked to do.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use caretaker::adapters::eeprom::NvsEeprom;
use caretaker::app::descriptor::{DeviceAdapter, DeviceDescriptor, HandlerTable};
use caretaker::app::events::DeviceEvent;
use caretaker::app::ports::{
    BoardPort, EventSink, NodeAddress, Platform, Ports, RadioLink, SerialPort, TimePort,
    TransportError,
};
use caretaker::error::ProtocolError;
use caretaker::messenger::{Command, Outbox, WriteMode, opcode};
use caretaker::transport::WiflyModule;

pub const MAC: &str = "00:06:66:71:d2:4b";

// ── Clock ─────────────────────────────────────────────────────

/// Shared simulated clock; the module driver and the device read the
/// same time.
#[derive(Clone, Default)]
pub struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    pub fn set(&self, ms: u64) {
        self.0.set(ms);
    }
}

impl TimePort for SimClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

// ── RN-XV simulation ──────────────────────────────────────────

/// Answers command mode like the real module and keeps data-mode
/// output apart from configuration commands.
#[derive(Default)]
pub struct RnxvSim {
    command_mode: bool,
    line: Vec<u8>,
    rx: VecDeque<u8>,
    /// Bytes the device sent to its TCP/UDP peer.
    pub data_out: Vec<u8>,
    /// Every command line received in command mode.
    pub commands: Vec<String>,
    /// Times the settings were committed.
    pub saves: u32,
    pub reboots: u32,
}

#[allow(dead_code)]
impl RnxvSim {
    /// Bytes arriving from the network peer.
    pub fn receive(&mut self, data: &[u8]) {
        self.rx.extend(data);
    }

    pub fn take_data(&mut self) -> String {
        String::from_utf8_lossy(&std::mem::take(&mut self.data_out)).into_owned()
    }

    pub fn in_command_mode(&self) -> bool {
        self.command_mode
    }

    pub fn has_command(&self, command: &str) -> bool {
        self.commands.iter().any(|c| c == command)
    }

    fn reply(&mut self, text: &str) {
        self.rx.extend(text.as_bytes());
    }

    fn execute(&mut self, line: String) {
        match line.as_str() {
            "" => {}
            "factory RESET" => self.reply("Set Factory Defaults\r\n"),
            "save" => {
                self.saves += 1;
                self.reply("Storing in config\r\n");
            }
            "reboot" => {
                self.reboots += 1;
                self.command_mode = false;
                self.reply("*Reboot*");
            }
            "exit" => {
                self.command_mode = false;
                self.reply("EXIT\r\n");
            }
            "get m" => self.reply(&format!("get m\r\nMac Addr={MAC}\r\n")),
            l if l.starts_with("set ") => self.reply("AOK\r\n<4.00> "),
            _ => self.reply("ERR: ?-Cmd\r\n"),
        }
        if !line.is_empty() {
            self.commands.push(line);
        }
    }
}

impl SerialPort for RnxvSim {
    fn available(&self) -> usize {
        self.rx.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if !self.command_mode {
            if data == b"$$$" {
                self.command_mode = true;
                self.reply("CMD\r\n");
            } else {
                self.data_out.extend_from_slice(data);
            }
            return Ok(());
        }
        for &b in data {
            if b == b'\r' {
                let line = String::from_utf8_lossy(&std::mem::take(&mut self.line)).into_owned();
                self.execute(line);
            } else {
                self.line.push(b);
            }
        }
        Ok(())
    }
}

// ── Board, sink, radio ────────────────────────────────────────

#[derive(Default)]
pub struct MockBoard {
    pub pressed: bool,
    pub led: bool,
    pub led_changes: u32,
}

impl BoardPort for MockBoard {
    fn button_pressed(&mut self) -> bool {
        self.pressed
    }

    fn set_led(&mut self, on: bool) {
        if self.led != on {
            self.led_changes += 1;
        }
        self.led = on;
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<DeviceEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, wanted: &DeviceEvent) -> usize {
        self.events.iter().filter(|e| *e == wanted).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &DeviceEvent) {
        self.events.push(event.clone());
    }
}

/// Records every frame and optionally fails sends to one address.
#[derive(Default)]
pub struct MockRadio {
    pub sent: Vec<(NodeAddress, Vec<u8>)>,
    pub unreachable: Option<u64>,
}

impl RadioLink for MockRadio {
    fn send(&mut self, to: NodeAddress, payload: &[u8]) -> Result<(), TransportError> {
        if self.unreachable == Some(to.addr64) {
            return Err(TransportError::Io);
        }
        self.sent.push((to, payload.to_vec()));
        Ok(())
    }
}

// ── Platform ──────────────────────────────────────────────────

pub struct SimPlatform;

impl Platform for SimPlatform {
    type Module = WiflyModule<RnxvSim, SimClock>;
    type Storage = NvsEeprom;
    type Board = MockBoard;
    type Clock = SimClock;
    type Sink = RecordingSink;
}

pub fn sim_ports() -> Ports<SimPlatform> {
    let clock = SimClock::default();
    Ports {
        module: WiflyModule::new(RnxvSim::default(), clock.clone(), 2_000),
        storage: NvsEeprom::new().expect("host NVS backend"),
        board: MockBoard::default(),
        clock,
        sink: RecordingSink::default(),
    }
}

// ── Dimmer adapter ────────────────────────────────────────────

/// Single-channel PWM dimmer.
#[derive(Default)]
pub struct Dimmer {
    pub level: u8,
    pub announced: u32,
}

impl Dimmer {
    fn state(&self) -> Command {
        Command::new(opcode::PWM_STATE).arg(self.level)
    }
}

fn on_pwm_write(d: &mut Dimmer, cmd: &Command, out: &mut Outbox) {
    let value = cmd.arg_as::<u8>(2).unwrap_or(0);
    d.level = match cmd.arg_as::<u8>(1).map(WriteMode::try_from) {
        Some(Ok(WriteMode::Absolute)) => value,
        Some(Ok(WriteMode::Toggle)) => {
            if d.level == 0 {
                255
            } else {
                0
            }
        }
        _ => 255,
    };
    out.send(d.state());
}

fn on_pwm_read(d: &mut Dimmer, _cmd: &Command, out: &mut Outbox) {
    out.send(d.state());
}

impl DeviceAdapter for Dimmer {
    fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            device_type: "Dimmer",
            description: "Hall dimmer",
            led_pin: Some(13),
            button_pin: Some(2),
        }
    }

    fn register_message_handlers(
        &mut self,
        handlers: &mut HandlerTable<Self>,
    ) -> Result<(), ProtocolError> {
        handlers.attach(opcode::PWM_WRITE, on_pwm_write)?;
        handlers.attach(opcode::PWM_READ, on_pwm_read)
    }

    fn registration_params(&self, request: &mut Command) {
        request.push_arg(1);
        request.push_arg(255);
    }

    fn on_operational(&mut self, out: &mut Outbox) {
        self.announced += 1;
        out.send(self.state());
    }
}
