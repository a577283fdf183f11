//! Text command framing for the WLAN transport.
//!
//! Wire format:
//! ```text
//! id , arg0 , arg1 , ... ;
//! ```
//!
//! `,` separates fields, `;` ends a command and `/` escapes the next
//! byte so arguments may contain separators. The decoder is a streaming
//! byte-at-a-time state machine: a single read may carry part of a
//! command or several commands back to back.

use crate::error::ProtocolError;

use super::Command;

pub const FIELD_SEPARATOR: u8 = b',';
pub const COMMAND_SEPARATOR: u8 = b';';
pub const ESCAPE: u8 = b'/';

/// Longest single field (protects the fixed buffer).
const MAX_FIELD_LEN: usize = 96;

/// Arguments kept per command, excluding the id.
const MAX_ARGS: usize = 12;

/// Streaming command decoder.
pub struct TextDecoder {
    field: heapless::Vec<u8, MAX_FIELD_LEN>,
    fields: Vec<String>,
    escaped: bool,
    error: Option<ProtocolError>,
}

impl Default for TextDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TextDecoder {
    pub fn new() -> Self {
        Self {
            field: heapless::Vec::new(),
            fields: Vec::new(),
            escaped: false,
            error: None,
        }
    }

    /// Feed one byte. Returns a result each time a terminator completes
    /// a command. A malformed command is reported once and discarded;
    /// decoding continues with the next byte.
    pub fn push(&mut self, byte: u8) -> Option<Result<Command, ProtocolError>> {
        if self.escaped {
            self.escaped = false;
            self.push_field_byte(byte);
            return None;
        }

        match byte {
            ESCAPE => {
                self.escaped = true;
                None
            }
            FIELD_SEPARATOR => {
                self.finish_field();
                None
            }
            COMMAND_SEPARATOR => {
                self.finish_field();
                Some(self.finish_command())
            }
            _ => {
                self.push_field_byte(byte);
                None
            }
        }
    }

    /// Feed a buffer and collect every completed command.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Result<Command, ProtocolError>> {
        data.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Drop any partial command (e.g. after the module reconnects).
    pub fn reset(&mut self) {
        self.field.clear();
        self.fields.clear();
        self.escaped = false;
        self.error = None;
    }

    fn push_field_byte(&mut self, byte: u8) {
        if self.field.push(byte).is_err() && self.error.is_none() {
            self.error = Some(ProtocolError::FieldTooLong);
        }
    }

    fn finish_field(&mut self) {
        if self.fields.len() > MAX_ARGS {
            if self.error.is_none() {
                self.error = Some(ProtocolError::TooManyArgs);
            }
        } else {
            self.fields
                .push(String::from_utf8_lossy(&self.field).into_owned());
        }
        self.field.clear();
    }

    fn finish_command(&mut self) -> Result<Command, ProtocolError> {
        let fields = core::mem::take(&mut self.fields);
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let mut fields = fields.into_iter();
        let id = fields
            .next()
            .and_then(|f| f.trim().parse::<u8>().ok())
            .ok_or(ProtocolError::BadCommandId)?;
        Ok(Command {
            id,
            args: fields.collect(),
        })
    }
}

/// Encode a command into its escaped wire form.
pub fn encode(command: &Command) -> Vec<u8> {
    let mut out = command.id.to_string().into_bytes();
    for arg in &command.args {
        out.push(FIELD_SEPARATOR);
        for &b in arg.as_bytes() {
            if matches!(b, FIELD_SEPARATOR | COMMAND_SEPARATOR | ESCAPE) {
                out.push(ESCAPE);
            }
            out.push(b);
        }
    }
    out.push(COMMAND_SEPARATOR);
    out
}
