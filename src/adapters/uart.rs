//! UART link to the radio module.
//!
//! - **`target_os = "espidf"`**: wraps an `esp_idf_hal::uart::UartDriver`
//!   with non-blocking reads.
//! - **`not(target_os = "espidf")`**: an in-memory loopback. Bytes
//!   injected with [`UartSerial::inject`] are read back; writes are kept
//!   for [`UartSerial::take_written`].

use crate::app::ports::{SerialPort, TransportError};

#[cfg(target_os = "espidf")]
use esp_idf_hal::uart::UartDriver;

pub struct UartSerial {
    #[cfg(target_os = "espidf")]
    driver: UartDriver<'static>,
    #[cfg(not(target_os = "espidf"))]
    rx: std::collections::VecDeque<u8>,
    #[cfg(not(target_os = "espidf"))]
    tx: Vec<u8>,
}

#[cfg(target_os = "espidf")]
impl UartSerial {
    pub fn new(driver: UartDriver<'static>) -> Self {
        Self { driver }
    }
}

#[cfg(target_os = "espidf")]
impl SerialPort for UartSerial {
    fn available(&self) -> usize {
        self.driver.remaining_read().unwrap_or(0)
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.driver.read(&mut byte, 0) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut sent = 0;
        while sent < data.len() {
            match self.driver.write(&data[sent..]) {
                Ok(n) => sent += n,
                Err(e) => {
                    log::warn!("uart: write failed: {}", e);
                    return Err(TransportError::Io);
                }
            }
        }
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for UartSerial {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl UartSerial {
    pub fn new() -> Self {
        Self {
            rx: std::collections::VecDeque::new(),
            tx: Vec::new(),
        }
    }

    /// Queue bytes as if the module had sent them.
    pub fn inject(&mut self, data: &[u8]) {
        self.rx.extend(data);
    }

    /// Everything written since the last call.
    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }
}

#[cfg(not(target_os = "espidf"))]
impl SerialPort for UartSerial {
    fn available(&self) -> usize {
        self.rx.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.tx.extend_from_slice(data);
        Ok(())
    }
}
