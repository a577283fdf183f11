//! Persisted device identity and its EEPROM layout.
//!
//! ```text
//!  addr  0   2                     39              72              105               170
//!        ┌───┬─────────────────────┬───────────────┬───────────────┬─────────────────┐
//!        │MGC│ uuid (36 + NUL)     │ name (32+NUL) │ ssid (32+NUL) │ phrase (64+NUL) │
//!        └───┴─────────────────────┴───────────────┴───────────────┴─────────────────┘
//! ```
//!
//! The marker is `0xCAFE`, little-endian. Anything else means the
//! device is in factory state.

use core::fmt::Write as _;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{EepromPort, StorageError};

/// Validity marker written last when provisioning completes.
pub const MAGIC: u16 = 0xCAFE;

/// Value every byte holds after an erase.
pub const ERASED: u8 = 0xFF;

pub const UUID_LEN: usize = 36;
pub const NAME_MAX_LEN: usize = 32;
pub const SSID_MAX_LEN: usize = 32;
pub const PHRASE_MAX_LEN: usize = 64;

pub const MAGIC_ADDR: usize = 0;
pub const UUID_ADDR: usize = MAGIC_ADDR + 2;
pub const NAME_ADDR: usize = UUID_ADDR + UUID_LEN + 1;
pub const SSID_ADDR: usize = NAME_ADDR + NAME_MAX_LEN + 1;
pub const PHRASE_ADDR: usize = SSID_ADDR + SSID_MAX_LEN + 1;

/// Bytes occupied by a provisioned identity.
pub const IMAGE_LEN: usize = PHRASE_ADDR + PHRASE_MAX_LEN + 1;

/// Identity and credentials captured during provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub uuid: heapless::String<UUID_LEN>,
    pub name: heapless::String<NAME_MAX_LEN>,
    pub ssid: heapless::String<SSID_MAX_LEN>,
    pub passphrase: heapless::String<PHRASE_MAX_LEN>,
}

impl DeviceIdentity {
    /// Build an identity, truncating each value to its field width.
    pub fn new(uuid: &str, name: &str, ssid: &str, passphrase: &str) -> Self {
        Self {
            uuid: truncated(uuid),
            name: truncated(name),
            ssid: truncated(ssid),
            passphrase: truncated(passphrase),
        }
    }

    /// Read the identity. `Ok(None)` means factory state.
    pub fn load(store: &impl EepromPort) -> Result<Option<Self>, StorageError> {
        let mut marker = [0u8; 2];
        store.read(MAGIC_ADDR, &mut marker)?;
        if u16::from_le_bytes(marker) != MAGIC {
            return Ok(None);
        }

        let mut image = [0u8; IMAGE_LEN];
        store.read(0, &mut image)?;

        let fields = (
            field(&image, UUID_ADDR, UUID_LEN),
            field(&image, NAME_ADDR, NAME_MAX_LEN),
            field(&image, SSID_ADDR, SSID_MAX_LEN),
            field(&image, PHRASE_ADDR, PHRASE_MAX_LEN),
        );
        match fields {
            (Some(uuid), Some(name), Some(ssid), Some(passphrase)) => {
                Ok(Some(Self::new(uuid, name, ssid, passphrase)))
            }
            _ => {
                warn!("identity: marker valid but a field is not UTF-8, treating as factory state");
                Ok(None)
            }
        }
    }

    /// Persist the identity. Fields first, marker last: an interrupted
    /// write leaves the store without a valid marker.
    pub fn store(&self, store: &mut impl EepromPort) -> Result<(), StorageError> {
        let image = self.to_image();
        store.write(UUID_ADDR, &image[UUID_ADDR..])?;
        store.write(MAGIC_ADDR, &image[MAGIC_ADDR..UUID_ADDR])?;
        info!("identity: stored device '{}' ({})", self.name, self.uuid);
        Ok(())
    }

    /// The exact bytes [`store`](Self::store) writes from address 0.
    pub fn to_image(&self) -> [u8; IMAGE_LEN] {
        let mut image = [0u8; IMAGE_LEN];
        image[MAGIC_ADDR..UUID_ADDR].copy_from_slice(&MAGIC.to_le_bytes());
        put(&mut image, UUID_ADDR, &self.uuid);
        put(&mut image, NAME_ADDR, &self.name);
        put(&mut image, SSID_ADDR, &self.ssid);
        put(&mut image, PHRASE_ADDR, &self.passphrase);
        image
    }
}

/// Overwrite every byte of the store with [`ERASED`] in a single write.
pub fn erase(store: &mut impl EepromPort) -> Result<(), StorageError> {
    let blank = vec![ERASED; store.capacity()];
    store.write(0, &blank)?;
    info!("identity: erased {} bytes", blank.len());
    Ok(())
}

/// Render an image as Intel HEX (32-byte data records plus EOF record),
/// ready for an external EEPROM programmer.
pub fn intel_hex(image: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in image.chunks(32).enumerate() {
        let addr = (i * 32) as u16;
        let mut sum = chunk.len() as u8;
        sum = sum.wrapping_add((addr >> 8) as u8).wrapping_add(addr as u8);
        let _ = write!(out, ":{:02x}{:04x}00", chunk.len(), addr);
        for b in chunk {
            let _ = write!(out, "{:02x}", b);
            sum = sum.wrapping_add(*b);
        }
        let _ = writeln!(out, "{:02x}", sum.wrapping_neg());
    }
    out.push_str(":00000001ff\n");
    out
}

fn truncated<const N: usize>(value: &str) -> heapless::String<N> {
    let mut end = value.len().min(N);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut s = heapless::String::new();
    let _ = s.push_str(&value[..end]);
    s
}

fn field(image: &[u8], addr: usize, max_len: usize) -> Option<&str> {
    let raw = &image[addr..addr + max_len];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(max_len);
    core::str::from_utf8(&raw[..end]).ok()
}

fn put(image: &mut [u8], addr: usize, value: &str) {
    let bytes = value.as_bytes();
    image[addr..addr + bytes.len()].copy_from_slice(bytes);
}
