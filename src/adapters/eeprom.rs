//! NVS-backed EEPROM emulation.
//!
//! Implements [`EepromPort`] as a RAM mirror of a single NVS blob. Reads
//! come from the mirror; every write updates the mirror and commits the
//! whole blob back.
//!
//! - Blank flash reads as [`ERASED`](crate::identity::ERASED), matching a
//!   fresh EEPROM.
//! - ESP-IDF NVS commits are atomic per `nvs_commit()`, so a power cut
//!   leaves either the old or the new image.
//! - A failed commit rolls the mirror back, so a retried write reaches
//!   flash instead of matching the uncommitted bytes.
//! - The simulation backend keeps the mirror only and can be told to
//!   fail commits.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{EepromPort, StorageError};
use crate::identity::ERASED;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Emulated EEPROM size.
pub const EEPROM_SIZE: usize = 1024;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"caretaker\0";
#[cfg(target_os = "espidf")]
const BLOB_KEY: &[u8] = b"eeprom\0";

pub struct NvsEeprom {
    mirror: Vec<u8>,
    #[cfg(not(target_os = "espidf"))]
    fail_commits: bool,
}

impl NvsEeprom {
    /// Initialise NVS flash and load the stored image.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[allow(unused_mut)]
        let mut mirror = vec![ERASED; EEPROM_SIZE];

        #[cfg(target_os = "espidf")]
        {
            init_flash()?;
            match load_blob(&mut mirror) {
                Ok(n) => info!("NvsEeprom: loaded {} bytes", n),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => info!("NvsEeprom: blank store"),
                Err(e) => {
                    warn!("NvsEeprom: read error {}", e);
                    return Err(StorageError::Io);
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsEeprom: simulation backend ({} bytes)", EEPROM_SIZE);

        Ok(Self {
            mirror,
            #[cfg(not(target_os = "espidf"))]
            fail_commits: false,
        })
    }

    /// Make every following commit fail with [`StorageError::Io`], as a
    /// worn or full partition would.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_commit_failure(&mut self, fail: bool) {
        self.fail_commits = fail;
    }

    #[cfg(target_os = "espidf")]
    fn commit(&self) -> Result<(), StorageError> {
        store_blob(&self.mirror).map_err(|e| {
            warn!("NvsEeprom: commit failed {}", e);
            StorageError::Io
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn commit(&self) -> Result<(), StorageError> {
        if self.fail_commits {
            return Err(StorageError::Io);
        }
        Ok(())
    }
}

impl EepromPort for NvsEeprom {
    fn capacity(&self) -> usize {
        self.mirror.len()
    }

    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let end = addr.checked_add(buf.len()).ok_or(StorageError::OutOfRange)?;
        let src = self.mirror.get(addr..end).ok_or(StorageError::OutOfRange)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), StorageError> {
        let end = addr.checked_add(data.len()).ok_or(StorageError::OutOfRange)?;
        let dst = self
            .mirror
            .get_mut(addr..end)
            .ok_or(StorageError::OutOfRange)?;
        if dst == data {
            return Ok(());
        }
        let previous = dst.to_vec();
        dst.copy_from_slice(data);
        if let Err(e) = self.commit() {
            self.mirror[addr..end].copy_from_slice(&previous);
            return Err(e);
        }
        Ok(())
    }
}

// ── ESP-IDF NVS helpers ───────────────────────────────────────

#[cfg(target_os = "espidf")]
fn init_flash() -> Result<(), StorageError> {
    // SAFETY: called once from the main task before any other NVS access.
    let ret = unsafe { nvs_flash_init() };
    if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
        warn!("NvsEeprom: erasing and re-initialising flash partition");
        if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
            return Err(StorageError::Io);
        }
    } else if ret != ESP_OK {
        return Err(StorageError::Io);
    }
    Ok(())
}

/// Open the namespace, run `f` with the handle, then close it.
#[cfg(target_os = "espidf")]
fn with_handle<T>(
    write: bool,
    f: impl FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
) -> Result<T, esp_err_t> {
    let mode = if write {
        nvs_open_mode_t_NVS_READWRITE
    } else {
        nvs_open_mode_t_NVS_READONLY
    };
    let mut handle: nvs_handle_t = 0;
    let ret = unsafe { nvs_open(NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
    if ret != ESP_OK {
        return Err(ret);
    }
    let result = f(handle);
    unsafe { nvs_close(handle) };
    result
}

#[cfg(target_os = "espidf")]
fn load_blob(mirror: &mut [u8]) -> Result<usize, esp_err_t> {
    with_handle(false, |handle| {
        let mut size = mirror.len();
        let ret = unsafe {
            nvs_get_blob(
                handle,
                BLOB_KEY.as_ptr() as *const _,
                mirror.as_mut_ptr() as *mut _,
                &mut size,
            )
        };
        if ret != ESP_OK {
            return Err(ret);
        }
        Ok(size)
    })
}

#[cfg(target_os = "espidf")]
fn store_blob(mirror: &[u8]) -> Result<(), esp_err_t> {
    with_handle(true, |handle| {
        let ret = unsafe {
            nvs_set_blob(
                handle,
                BLOB_KEY.as_ptr() as *const _,
                mirror.as_ptr() as *const _,
                mirror.len(),
            )
        };
        if ret != ESP_OK {
            return Err(ret);
        }
        let ret = unsafe { nvs_commit(handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        Ok(())
    })
}
