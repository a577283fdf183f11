//! Radio module transport.
//!
//! - [`wifly`]: command/data mode driver implementing
//!   [`ModulePort`](crate::app::ports::ModulePort) over a raw serial port.
//! - [`commands`]: the configuration batches the provisioning flow sends.
//! - [`scanner`]: marker and line matchers for the pairing text protocol.

pub mod commands;
pub mod scanner;
pub mod wifly;

pub use scanner::{LineReader, MarkerScanner};
pub use wifly::WiflyModule;
