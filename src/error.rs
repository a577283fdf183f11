//! Unified error types for the Caretaker device core.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the adapter-facing API uniform. All variants are `Copy` so they can be
//! logged, emitted as events and stored in the state machine context
//! without allocation.
//!
//! Note that the connectivity state machine never returns these from
//! `update()`: link and storage failures are recovered by state
//! transitions. Errors surface only from construction and from the
//! explicit adapter-facing calls (`send`, low-power control).

use core::fmt;

pub use crate::app::ports::{StorageError, TransportError};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The radio module or serial link failed.
    Transport(TransportError),
    /// The persistent store rejected a read or write.
    Storage(StorageError),
    /// A message could not be decoded, encoded or dispatched.
    Protocol(ProtocolError),
    /// Configuration is invalid.
    Config(&'static str),
    /// The call is only allowed once the device is registered.
    NotOperational,
    /// The call needs a board feature that is switched off.
    FeatureDisabled(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::NotOperational => write!(f, "device is not operational"),
            Self::FeatureDisabled(name) => write!(f, "feature disabled: {name}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The command id field is missing or not a number.
    BadCommandId,
    /// A field exceeded the decoder's fixed buffer.
    FieldTooLong,
    /// A command carried more arguments than the decoder keeps.
    TooManyArgs,
    /// Radio opcode carries the unused message-type value `1`.
    UnknownMessageType,
    /// Radio message was empty.
    EmptyMessage,
    /// The handler table has no free entry.
    HandlerTableFull,
    /// Adapters may not attach handlers to connectivity opcodes.
    ReservedOpcode(u8),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadCommandId => write!(f, "bad command id"),
            Self::FieldTooLong => write!(f, "field too long"),
            Self::TooManyArgs => write!(f, "too many arguments"),
            Self::UnknownMessageType => write!(f, "unknown message type"),
            Self::EmptyMessage => write!(f, "empty message"),
            Self::HandlerTableFull => write!(f, "handler table full"),
            Self::ReservedOpcode(op) => write!(f, "opcode {op} is reserved"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
