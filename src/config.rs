//! Device configuration parameters
//!
//! Every timing constant and board feature switch used by the
//! connectivity core. Boards construct one of these at startup and hand
//! it to [`CaretakerDevice::init`](crate::app::device::CaretakerDevice::init).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Board capabilities that used to be compile-time switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Pairing flow (access point + config app) and factory reset.
    pub auto_config: bool,
    /// Module sleep/wake control for battery boards.
    pub low_power: bool,
    /// Dump identity and module commands at `debug!` level.
    pub debug_logging: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            auto_config: true,
            low_power: false,
            debug_logging: false,
        }
    }
}

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub features: FeatureFlags,

    // --- Provisioning ---
    /// How long the button must stay held before the store is erased
    pub factory_reset_confirm_ms: u32,
    /// How long the pairing app has to send the configuration
    pub config_timeout_ms: u32,
    /// Maximum wait for each configuration line
    pub config_line_timeout_ms: u32,
    /// Maximum wait for the close marker after the last config line
    pub config_close_timeout_ms: u32,
    /// Access point SSID prefix; the hardware address is appended
    pub pairing_ssid_prefix: heapless::String<16>,
    /// Access point passphrase used while pairing
    pub pairing_passphrase: heapless::String<16>,
    /// Access point address (also gateway) while pairing
    pub pairing_ip: [u8; 4],
    pub pairing_netmask: [u8; 4],

    // --- Network / server ---
    /// Maximum wait for the address line after the broadcast marker
    pub server_address_timeout_ms: u32,
    /// Registration response deadline before the request is resent
    pub registration_timeout_ms: u32,
    /// Keepalive ping interval while operational
    pub ping_interval_ms: u32,
    /// UDP broadcast interval programmed into the module (seconds)
    pub broadcast_interval_secs: u8,
    /// Non-standard broadcast port (module default is 55555)
    pub broadcast_port: Option<u16>,

    // --- Module ---
    /// Upper bound for every module acknowledgement
    pub module_command_timeout_ms: u32,
    /// UART baud rate programmed into the module
    pub module_baud_rate: u32,
    /// Bytes consumed from the module per `update()` call
    pub max_bytes_per_tick: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut pairing_ssid_prefix = heapless::String::new();
        let _ = pairing_ssid_prefix.push_str("Caretaker-");
        let mut pairing_passphrase = heapless::String::new();
        let _ = pairing_passphrase.push_str("0347342d");

        Self {
            features: FeatureFlags::default(),

            // Provisioning
            factory_reset_confirm_ms: 3_000,
            config_timeout_ms: 5 * 60 * 1_000,
            config_line_timeout_ms: 1_000,
            config_close_timeout_ms: 5_000,
            pairing_ssid_prefix,
            pairing_passphrase,
            pairing_ip: [192, 168, 0, 1],
            pairing_netmask: [255, 255, 255, 0],

            // Network / server
            server_address_timeout_ms: 1_000,
            registration_timeout_ms: 20_000,
            ping_interval_ms: 5 * 60 * 1_000,
            broadcast_interval_secs: 7,
            broadcast_port: None,

            // Module
            module_command_timeout_ms: 2_000,
            module_baud_rate: 57_600,
            max_bytes_per_tick: 64,
        }
    }
}

impl DeviceConfig {
    /// Reject values that would stall or spin the state machine.
    pub fn validate(&self) -> Result<()> {
        if self.factory_reset_confirm_ms < 500 {
            return Err(Error::Config("factory_reset_confirm_ms must be >= 500"));
        }
        if self.config_timeout_ms == 0
            || self.config_line_timeout_ms == 0
            || self.config_close_timeout_ms == 0
            || self.server_address_timeout_ms == 0
        {
            return Err(Error::Config("provisioning timeouts must be non-zero"));
        }
        if self.registration_timeout_ms < 1_000 {
            return Err(Error::Config("registration_timeout_ms must be >= 1000"));
        }
        if self.ping_interval_ms < 1_000 {
            return Err(Error::Config("ping_interval_ms must be >= 1000"));
        }
        if !(100..=60_000).contains(&self.module_command_timeout_ms) {
            return Err(Error::Config("module_command_timeout_ms must be 100–60000"));
        }
        if self.max_bytes_per_tick == 0 {
            return Err(Error::Config("max_bytes_per_tick must be non-zero"));
        }
        if self.pairing_ssid_prefix.is_empty() {
            return Err(Error::Config("pairing_ssid_prefix must not be empty"));
        }
        if self.pairing_passphrase.len() < 8 {
            return Err(Error::Config("pairing_passphrase must be >= 8 characters"));
        }
        Ok(())
    }
}
