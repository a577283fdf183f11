//! Mock ports shared by the unit tests.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::app::descriptor::{DeviceAdapter, DeviceDescriptor, HandlerTable};
use crate::app::events::DeviceEvent;
use crate::app::ports::{
    BoardPort, EepromPort, EventSink, ModulePort, NodeAddress, Platform, Ports, RadioLink,
    SerialPort, StorageError, TimePort, TransportError,
};
use crate::error::ProtocolError;
use crate::identity::ERASED;
use crate::messenger::{Command, Outbox, WriteMode, opcode};

// ── Storage ────────────────────────────────────────────────────

/// Byte array starting in the erased state. Records every write.
pub struct MemEeprom {
    pub bytes: Vec<u8>,
    pub writes: Vec<(usize, Vec<u8>)>,
    pub fail_writes: bool,
}

impl MemEeprom {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![ERASED; capacity],
            writes: Vec::new(),
            fail_writes: false,
        }
    }
}

impl EepromPort for MemEeprom {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let src = self
            .bytes
            .get(addr..addr + buf.len())
            .ok_or(StorageError::OutOfRange)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io);
        }
        let dst = self
            .bytes
            .get_mut(addr..addr + data.len())
            .ok_or(StorageError::OutOfRange)?;
        dst.copy_from_slice(data);
        self.writes.push((addr, data.to_vec()));
        Ok(())
    }
}

// ── Clock ──────────────────────────────────────────────────────

/// Shared manual clock. Clones observe the same time. With a non-zero
/// step every reading advances the clock, which lets bounded polling
/// loops reach their deadline.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    step: u64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
            step: 0,
        }
    }

    pub fn auto_step(start: u64, step: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
            step,
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl TimePort for ManualClock {
    fn now_ms(&self) -> u64 {
        let t = self.now.get();
        self.now.set(t + self.step);
        t
    }
}

// ── Raw serial with canned module replies ──────────────────────

/// Serial port that answers writes starting with a trigger text.
#[derive(Default)]
pub struct ScriptedSerial {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    rules: Vec<(String, String)>,
}

impl ScriptedSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies of an RN-XV module in its default configuration.
    pub fn wifly() -> Self {
        let mut s = Self::new();
        s.on("$$$", "CMD\r\n");
        s.on("get m", "get m\r\nMac Addr=00:06:66:71:d2:4b\r\n");
        s.on("factory RESET", "Set Factory Defaults\r\n");
        s.on("save", "Storing in config\r\n");
        s.on("reboot", "*Reboot*");
        s.on("exit", "EXIT\r\n");
        s.on("set ", "AOK\r\n");
        s
    }

    pub fn on(&mut self, trigger: &str, reply: &str) {
        self.rules.push((trigger.into(), reply.into()));
    }

    /// Make writes starting with `trigger` go unanswered.
    pub fn silence(&mut self, trigger: &str) {
        self.rules.insert(0, (trigger.into(), String::new()));
    }

    pub fn inject(&mut self, data: &[u8]) {
        self.rx.extend(data);
    }

    pub fn sent_text(&self) -> String {
        String::from_utf8_lossy(&self.tx).into_owned()
    }
}

impl SerialPort for ScriptedSerial {
    fn available(&self) -> usize {
        self.rx.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.tx.extend_from_slice(data);
        let text = String::from_utf8_lossy(data);
        if let Some((_, reply)) = self.rules.iter().find(|(t, _)| text.starts_with(t.as_str())) {
            self.rx.extend(reply.as_bytes());
        }
        Ok(())
    }
}

// ── Module ─────────────────────────────────────────────────────

/// Module that acknowledges everything and records what it was told.
pub struct MockModule {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    /// `send_command` / `query` texts in order.
    pub commands: Vec<String>,
    /// reset / save / reboot / data_mode / flush in order.
    pub ops: Vec<&'static str>,
    pub data_mode: bool,
    pub sleep_after: Option<u16>,
    fail_prefixes: Vec<String>,
}

impl Default for MockModule {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModule {
    pub const MAC: &'static str = "00:06:66:71:d2:4b";

    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            tx: Vec::new(),
            commands: Vec::new(),
            ops: Vec::new(),
            data_mode: true,
            sleep_after: None,
            fail_prefixes: Vec::new(),
        }
    }

    pub fn inject(&mut self, data: &[u8]) {
        self.rx.extend(data);
    }

    /// Everything written to the data stream since the last call.
    pub fn take_sent(&mut self) -> String {
        String::from_utf8_lossy(&std::mem::take(&mut self.tx)).into_owned()
    }

    /// Commands or operations starting with `prefix` time out.
    pub fn fail_on(&mut self, prefix: &str) {
        self.fail_prefixes.push(prefix.into());
    }

    pub fn clear_failures(&mut self) {
        self.fail_prefixes.clear();
    }

    fn check(&self, what: &str) -> Result<(), TransportError> {
        if self.fail_prefixes.iter().any(|p| what.starts_with(p.as_str())) {
            return Err(TransportError::Timeout);
        }
        Ok(())
    }

    fn op(&mut self, name: &'static str) -> Result<(), TransportError> {
        self.check(name)?;
        self.ops.push(name);
        Ok(())
    }
}

impl ModulePort for MockModule {
    fn available(&self) -> usize {
        self.rx.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.check("write")?;
        self.tx.extend_from_slice(data);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.op("reset")?;
        self.data_mode = true;
        Ok(())
    }

    fn send_command(&mut self, command: &str, _ack: Option<&str>) -> Result<(), TransportError> {
        self.check(command)?;
        self.data_mode = false;
        self.commands.push(command.into());
        Ok(())
    }

    fn query(&mut self, command: &str, _prefix: &str, out: &mut [u8]) -> Result<(), TransportError> {
        self.send_command(command, None)?;
        let mac = Self::MAC.as_bytes();
        let n = out.len().min(mac.len());
        out[..n].copy_from_slice(&mac[..n]);
        Ok(())
    }

    fn save(&mut self) -> Result<(), TransportError> {
        self.op("save")
    }

    fn reboot(&mut self) -> Result<(), TransportError> {
        self.op("reboot")?;
        self.data_mode = true;
        Ok(())
    }

    fn enter_data_mode(&mut self) -> Result<(), TransportError> {
        self.op("data_mode")?;
        self.data_mode = true;
        Ok(())
    }

    fn flush(&mut self) {
        self.ops.push("flush");
        self.rx.clear();
    }

    fn sleep_after(&mut self, secs: u16) -> Result<(), TransportError> {
        self.op("sleep")?;
        self.sleep_after = Some(secs);
        Ok(())
    }

    fn wake(&mut self) -> Result<(), TransportError> {
        self.op("wake")?;
        self.sleep_after = None;
        Ok(())
    }
}

// ── Board, sink, radio ─────────────────────────────────────────

#[derive(Default)]
pub struct MockBoard {
    pub pressed: bool,
    pub led: bool,
    pub led_writes: usize,
}

impl BoardPort for MockBoard {
    fn button_pressed(&mut self) -> bool {
        self.pressed
    }

    fn set_led(&mut self, on: bool) {
        self.led = on;
        self.led_writes += 1;
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<DeviceEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &DeviceEvent) {
        self.events.push(event.clone());
    }
}

#[derive(Default)]
pub struct MockRadio {
    pub sent: Vec<(NodeAddress, Vec<u8>)>,
}

impl RadioLink for MockRadio {
    fn send(&mut self, to: NodeAddress, payload: &[u8]) -> Result<(), TransportError> {
        self.sent.push((to, payload.to_vec()));
        Ok(())
    }
}

// ── Platform + adapter ─────────────────────────────────────────

pub struct TestPlatform;

impl Platform for TestPlatform {
    type Module = MockModule;
    type Storage = MemEeprom;
    type Board = MockBoard;
    type Clock = ManualClock;
    type Sink = RecordingSink;
}

pub fn test_ports() -> Ports<TestPlatform> {
    Ports {
        module: MockModule::new(),
        storage: MemEeprom::new(1024),
        board: MockBoard::default(),
        clock: ManualClock::new(0),
        sink: RecordingSink::default(),
    }
}

/// Single relay switch.
#[derive(Default)]
pub struct TestSwitch {
    pub on: bool,
    pub operational_calls: u32,
    /// Try to take over a connectivity opcode.
    pub hijack_ping: bool,
}

impl TestSwitch {
    fn state_message(&self) -> Command {
        Command::new(opcode::SWITCH_STATE).arg(u8::from(self.on))
    }
}

fn on_switch_write(s: &mut TestSwitch, cmd: &Command, out: &mut Outbox) {
    let value = cmd.arg_as::<u8>(2).unwrap_or(0);
    match cmd.arg_as::<u8>(1).map(WriteMode::try_from) {
        Some(Ok(WriteMode::Toggle)) => s.on = !s.on,
        Some(Ok(WriteMode::Absolute)) => s.on = value != 0,
        _ => s.on = true,
    }
    out.send(s.state_message());
}

fn on_switch_read(s: &mut TestSwitch, _cmd: &Command, out: &mut Outbox) {
    out.send(s.state_message());
}

impl DeviceAdapter for TestSwitch {
    fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            device_type: "Switch",
            description: "Test switch",
            led_pin: Some(13),
            button_pin: Some(2),
        }
    }

    fn register_message_handlers(
        &mut self,
        handlers: &mut HandlerTable<Self>,
    ) -> Result<(), ProtocolError> {
        handlers.attach(opcode::SWITCH_WRITE, on_switch_write)?;
        handlers.attach(opcode::SWITCH_READ, on_switch_read)?;
        if self.hijack_ping {
            handlers.attach(opcode::PING_REQUEST, on_switch_read)?;
        }
        Ok(())
    }

    fn registration_params(&self, request: &mut Command) {
        request.push_arg(1);
    }

    fn on_operational(&mut self, out: &mut Outbox) {
        self.operational_calls += 1;
        out.send(self.state_message());
    }
}
