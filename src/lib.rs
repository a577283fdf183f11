//! Caretaker device library.
//!
//! Connectivity and provisioning core for Caretaker home-automation
//! endpoints: the button/LED pairing flow, the WLAN module driver, the
//! server registration handshake and the text message dispatch. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod fsm;
pub mod identity;
pub mod listener;
pub mod messenger;
pub mod transport;

#[cfg(test)]
mod testing;

pub use app::device::CaretakerDevice;
pub use error::{Error, Result};
