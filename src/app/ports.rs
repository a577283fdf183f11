//! Port traits: the hexagonal boundary between the connectivity core and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CaretakerDevice (domain)
//! ```
//!
//! Driven adapters (radio module, EEPROM, LED/button, clock, event sink)
//! implement these traits. [`CaretakerDevice`](super::device::CaretakerDevice)
//! consumes them through the [`Platform`] bundle, so the state machine
//! never touches hardware directly.

use super::events::DeviceEvent;

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock. Read once per `update()`.
pub trait TimePort {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Persistent store port
// ───────────────────────────────────────────────────────────────

/// Byte-addressable non-volatile store (EEPROM semantics).
///
/// Only the state machine writes it, and only while provisioning or
/// performing a factory reset.
pub trait EepromPort {
    /// Total number of addressable bytes.
    fn capacity(&self) -> usize;

    /// Fill `buf` with the bytes starting at `addr`.
    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` starting at `addr`.
    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Serial byte stream port
// ───────────────────────────────────────────────────────────────

/// Raw, non-blocking byte stream to the radio module.
pub trait SerialPort {
    /// Bytes that can be read without waiting.
    fn available(&self) -> usize;

    /// Read one byte if one is waiting.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue bytes for transmission.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Radio module port
// ───────────────────────────────────────────────────────────────

/// Command/response interface to the WLAN module plus its data stream.
///
/// Every call that waits for the module is bounded by the
/// implementation's command timeout. A missing acknowledgement returns
/// [`TransportError::Timeout`]; it never blocks forever.
pub trait ModulePort {
    /// Bytes waiting in the data stream.
    fn available(&self) -> usize;

    /// Read one data byte if one is waiting.
    fn read_byte(&mut self) -> Option<u8>;

    /// Write raw bytes to the data stream.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Restore factory settings and restart the module.
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Send a `\r`-terminated configuration command. When `ack` is
    /// given, wait until the module echoes that substring.
    fn send_command(&mut self, command: &str, ack: Option<&str>) -> Result<(), TransportError>;

    /// Send `command`, wait for `prefix`, then read exactly `out.len()`
    /// bytes of the value that follows.
    fn query(&mut self, command: &str, prefix: &str, out: &mut [u8]) -> Result<(), TransportError>;

    /// Commit the current settings to the module's flash.
    fn save(&mut self) -> Result<(), TransportError>;

    /// Restart the module with the saved settings.
    fn reboot(&mut self) -> Result<(), TransportError>;

    /// Leave command mode; subsequent bytes are payload.
    fn enter_data_mode(&mut self) -> Result<(), TransportError>;

    /// Discard everything waiting in the receive buffer.
    fn flush(&mut self);

    /// Put the module to sleep after `secs` seconds of inactivity.
    fn sleep_after(&mut self, secs: u16) -> Result<(), TransportError>;

    /// Wake a sleeping module.
    fn wake(&mut self) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Board port (LED + button)
// ───────────────────────────────────────────────────────────────

/// The two pins the connectivity core drives directly.
pub trait BoardPort {
    /// `true` while the provisioning button is held down.
    fn button_pressed(&mut self) -> bool;

    /// Drive the status LED.
    fn set_led(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Radio link port (ZigBee-style addressed frames)
// ───────────────────────────────────────────────────────────────

/// 64-bit hardware address plus optional 16-bit network short address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeAddress {
    pub addr64: u64,
    pub addr16: u16,
}

impl NodeAddress {
    /// The zero/zero address marks an empty slot.
    pub const EMPTY: Self = Self {
        addr64: 0,
        addr16: 0,
    };

    pub const fn new(addr64: u64, addr16: u16) -> Self {
        Self { addr64, addr16 }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

/// Addressed frame transmission used by the listener registry.
pub trait RadioLink {
    fn send(&mut self, to: NodeAddress, payload: &[u8]) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / diagnostics)
// ───────────────────────────────────────────────────────────────

/// The state machine emits structured [`DeviceEvent`]s through this
/// port. Adapters decide where they go (serial log, debug UART, tests).
pub trait EventSink {
    fn emit(&mut self, event: &DeviceEvent);
}

// ───────────────────────────────────────────────────────────────
// Platform bundle
// ───────────────────────────────────────────────────────────────

/// Binds one concrete adapter per port for a given board.
pub trait Platform {
    type Module: ModulePort;
    type Storage: EepromPort;
    type Board: BoardPort;
    type Clock: TimePort;
    type Sink: EventSink;
}

/// Owned port instances for a [`Platform`].
pub struct Ports<P: Platform> {
    pub module: P::Module,
    pub storage: P::Storage,
    pub board: P::Board,
    pub clock: P::Clock,
    pub sink: P::Sink,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`SerialPort`], [`ModulePort`] and [`RadioLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The expected acknowledgement did not arrive in time.
    Timeout,
    /// A response did not fit the caller's buffer.
    Overflow,
    /// The underlying driver reported a failure.
    Io,
}

/// Errors from [`EepromPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Address range lies outside the store.
    OutOfRange,
    /// Generic I/O error from the storage backend.
    Io,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out waiting for module"),
            Self::Overflow => write!(f, "response overflow"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "address out of range"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}
