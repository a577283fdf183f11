//! Application message protocol.
//!
//! Two wire variants share the same command model:
//!
//! - [`text`]: the WLAN variant: `id,arg,arg;` with `/` escaping.
//! - [`radio`]: the ZigBee variant: one opcode byte whose top two bits
//!   carry the message type, followed by raw payload bytes.
//!
//! Opcode numbers are part of the wire contract and must never be
//! renumbered.

pub mod radio;
pub mod text;

use core::fmt::Display;
use core::str::FromStr;

/// Opcodes of the text variant.
pub mod opcode {
    pub const INVALID: u8 = 0;
    pub const REGISTER_REQUEST: u8 = 1;
    pub const REGISTER_RESPONSE: u8 = 2;
    pub const PING_REQUEST: u8 = 3;
    pub const PING_RESPONSE: u8 = 4;
    pub const SWITCH_WRITE: u8 = 5;
    pub const SWITCH_READ: u8 = 6;
    pub const SWITCH_STATE: u8 = 7;
    pub const RGB_WRITE: u8 = 8;
    pub const RGB_READ: u8 = 9;
    pub const RGB_STATE: u8 = 10;
    pub const PWM_WRITE: u8 = 11;
    pub const PWM_READ: u8 = 12;
    pub const PWM_STATE: u8 = 13;

    /// Opcodes the connectivity core handles itself.
    pub const fn is_reserved(op: u8) -> bool {
        matches!(
            op,
            INVALID | REGISTER_REQUEST | REGISTER_RESPONSE | PING_REQUEST | PING_RESPONSE
        )
    }
}

/// How a `*_WRITE` message applies its value. Shared by both variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WriteMode {
    Default = 0,
    Absolute = 1,
    Increment = 2,
    IncrementDefault = 3,
    Decrement = 4,
    DecrementDefault = 5,
    Toggle = 6,
}

impl TryFrom<u8> for WriteMode {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        Ok(match v {
            0 => Self::Default,
            1 => Self::Absolute,
            2 => Self::Increment,
            3 => Self::IncrementDefault,
            4 => Self::Decrement,
            5 => Self::DecrementDefault,
            6 => Self::Toggle,
            other => return Err(other),
        })
    }
}

/// One decoded (or to-be-encoded) message: opcode plus text arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub id: u8,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            args: Vec::new(),
        }
    }

    /// Builder-style argument append.
    #[must_use]
    pub fn arg(mut self, value: impl Display) -> Self {
        self.push_arg(value);
        self
    }

    pub fn push_arg(&mut self, value: impl Display) {
        self.args.push(value.to_string());
    }

    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Parse argument `index`; `None` if missing or malformed.
    pub fn arg_as<T: FromStr>(&self, index: usize) -> Option<T> {
        self.arg_str(index)?.trim().parse().ok()
    }
}

/// Replies queued by message handlers; the device writes them to the
/// transport after the handler returns.
#[derive(Debug, Default)]
pub struct Outbox {
    queued: Vec<Command>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, command: Command) {
        self.queued.push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Take every queued command in send order.
    pub fn drain(&mut self) -> std::vec::Drain<'_, Command> {
        self.queued.drain(..)
    }
}
