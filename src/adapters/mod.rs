//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements  | Connects to                    |
//! |------------|-------------|--------------------------------|
//! | `board`    | BoardPort   | Status LED + button GPIO       |
//! | `eeprom`   | EepromPort  | NVS blob / in-memory mirror    |
//! | `log_sink` | EventSink   | Serial log output              |
//! | `time`     | TimePort    | ESP32 system timer             |
//! | `uart`     | SerialPort  | Module UART / host loopback    |
//!
//! The module driver itself ([`WiflyModule`](crate::transport::WiflyModule))
//! sits on top of `uart`.

pub mod board;
pub mod eeprom;
pub mod log_sink;
pub mod time;
pub mod uart;
