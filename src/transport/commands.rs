//! Module configuration sequences used by the provisioning flow.
//!
//! Each function issues a batch of `set` commands and waits for the
//! acknowledgement of every one of them, so a failure anywhere aborts
//! the batch with the first error.

use std::net::Ipv4Addr;

use crate::app::ports::{ModulePort, TransportError};
use crate::config::DeviceConfig;
use crate::identity::DeviceIdentity;

/// `xx:xx:xx:xx:xx:xx`
pub const HARDWARE_ADDRESS_LEN: usize = 17;

pub type HardwareAddress = heapless::String<HARDWARE_ADDRESS_LEN>;

/// Room for prefix plus twelve hex digits.
pub type PairingSsid = heapless::String<32>;

const ACK: Option<&str> = Some("OK");

/// Restore factory settings and pin the UART baud rate.
pub fn prepare(module: &mut impl ModulePort, baud_rate: u32) -> Result<(), TransportError> {
    module.reset()?;
    module.send_command(&format!("set u b {baud_rate}"), None)
}

pub fn read_hardware_address(
    module: &mut impl ModulePort,
) -> Result<HardwareAddress, TransportError> {
    let mut raw = [0u8; HARDWARE_ADDRESS_LEN];
    module.query("get m", "Mac Addr=", &mut raw)?;
    let text = core::str::from_utf8(&raw).map_err(|_| TransportError::Io)?;
    let mut mac = HardwareAddress::new();
    mac.push_str(text).map_err(|_| TransportError::Overflow)?;
    Ok(mac)
}

/// Access point name shown to the pairing app: the prefix followed by
/// the hardware address without separators.
pub fn pairing_ssid(prefix: &str, mac: &str) -> PairingSsid {
    let mut ssid = PairingSsid::new();
    for ch in prefix.chars().chain(mac.chars().filter(|c| *c != ':')) {
        if ssid.push(ch).is_err() {
            break;
        }
    }
    ssid
}

/// Open an access point with a DHCP server for the pairing app.
pub fn configure_access_point(
    module: &mut impl ModulePort,
    ssid: &str,
    config: &DeviceConfig,
) -> Result<(), TransportError> {
    let ip = Ipv4Addr::from(config.pairing_ip);
    let netmask = Ipv4Addr::from(config.pairing_netmask);

    module.send_command("set w j 7", ACK)?;
    module.send_command("set w c 6", ACK)?;
    module.send_command(&format!("set a s {ssid}"), ACK)?;
    module.send_command(&format!("set a p {}", config.pairing_passphrase), ACK)?;
    module.send_command("set i d 4", ACK)?;
    module.send_command(&format!("set i a {ip}"), ACK)?;
    module.send_command(&format!("set i n {netmask}"), ACK)?;
    module.send_command(&format!("set i g {ip}"), ACK)
}

/// Join the stored network as a DHCP client and start UDP broadcasts so
/// the server can find the device.
pub fn configure_station(
    module: &mut impl ModulePort,
    identity: &DeviceIdentity,
    config: &DeviceConfig,
) -> Result<(), TransportError> {
    module.send_command("set i h 0.0.0.0", ACK)?;
    module.send_command("set i f 0x40", ACK)?;
    module.send_command("set i d 1", ACK)?;
    module.send_command("set i p 1", ACK)?;
    module.send_command(&format!("set b i {}", config.broadcast_interval_secs), ACK)?;
    if let Some(port) = config.broadcast_port {
        module.send_command(&format!("set b p {port}"), ACK)?;
    }
    module.send_command("set w a 4", ACK)?;
    module.send_command("set w c 0", ACK)?;
    module.send_command("set w j 1", ACK)?;
    module.send_command(&format!("set w s {}", identity.ssid), ACK)?;
    module.send_command(&format!("set w p {}", identity.passphrase), ACK)?;
    module.send_command(&format!("set o d {}", identity.name), ACK)
}

/// Send all further datagrams to `server` and stop broadcasting.
pub fn pin_server(module: &mut impl ModulePort, server: &str) -> Result<(), TransportError> {
    module.send_command(&format!("set i h {server}"), ACK)?;
    module.send_command("set b i 0", ACK)
}

/// Persist the module settings and restart it.
pub fn commit(module: &mut impl ModulePort) -> Result<(), TransportError> {
    module.save()?;
    module.reboot()
}
