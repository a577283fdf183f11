//! Binary message format of the ZigBee variant.
//!
//! ```text
//!  bit  7 6 5 4 3 2 1 0
//!      ┌───┬───────────┐
//!      │typ│  command  │  payload bytes ...
//!      └───┴───────────┘
//! ```
//!
//! `typ` is 0 (request), 2 (response) or 3 (notify). Value 1 is unused.

use crate::error::ProtocolError;

pub const TYPE_SHIFT: u8 = 6;
pub const TYPE_MASK: u8 = 0b11 << TYPE_SHIFT;
pub const COMMAND_MASK: u8 = 0x3f;

/// Command numbers of the radio variant.
pub mod command {
    pub const RESET: u8 = 0;
    pub const ADD_LISTENER: u8 = 1;
    pub const REMOVE_LISTENER: u8 = 2;
    pub const PROGRAM_WRITE: u8 = 3;
    pub const PROGRAM_READ: u8 = 4;
    pub const SWITCH_WRITE: u8 = 5;
    pub const SWITCH_READ: u8 = 6;
    pub const SENSOR_READ: u8 = 7;
    pub const SERVO_WRITE: u8 = 8;
    pub const SERVO_READ: u8 = 9;
    pub const PWM_WRITE: u8 = 10;
    pub const PWM_READ: u8 = 11;
    pub const RGB_WRITE: u8 = 12;
    pub const RGB_READ: u8 = 13;
    pub const DUMP: u8 = 14;
    pub const REFLOW_OVEN_ACTION: u8 = 15;
    pub const REFLOW_OVEN_STATUS: u8 = 16;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Request = 0,
    Response = 2,
    Notify = 3,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(bits: u8) -> Result<Self, ProtocolError> {
        match bits {
            0 => Ok(Self::Request),
            2 => Ok(Self::Response),
            3 => Ok(Self::Notify),
            _ => Err(ProtocolError::UnknownMessageType),
        }
    }
}

/// Pack a message type and a command into the opcode byte. Command bits
/// above the mask are dropped.
pub const fn header(kind: MessageType, command: u8) -> u8 {
    ((kind as u8) << TYPE_SHIFT) | (command & COMMAND_MASK)
}

/// A received frame, borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioMessage<'a> {
    pub kind: MessageType,
    pub command: u8,
    pub payload: &'a [u8],
}

impl<'a> RadioMessage<'a> {
    pub fn parse(frame: &'a [u8]) -> Result<Self, ProtocolError> {
        let (&op, payload) = frame.split_first().ok_or(ProtocolError::EmptyMessage)?;
        Ok(Self {
            kind: MessageType::try_from(op >> TYPE_SHIFT)?,
            command: op & COMMAND_MASK,
            payload,
        })
    }
}
