//! RN-XV "WiFly" module driver.
//!
//! Implements [`ModulePort`] over any raw [`SerialPort`]. The module has
//! two modes:
//!
//! - **data mode**: every byte is payload for the TCP/UDP peer.
//! - **command mode**: entered with `$$$` (module answers `CMD`), accepts
//!   `\r`-terminated `set`/`get`/`save`/`reboot` commands and answers
//!   with short text acknowledgements (`AOK`, `Storing in config`, ...).
//!
//! Every wait polls the serial port against the clock and gives up after
//! `timeout_ms` with [`TransportError::Timeout`].

use log::{debug, warn};

use crate::app::ports::{ModulePort, SerialPort, TimePort, TransportError};

use super::scanner::MarkerScanner;

const ENTER_COMMAND_MODE: &[u8] = b"$$$";
const COMMAND_PROMPT: &str = "CMD";
const SAVE_ACK: &str = "Storing in config";
const REBOOT_ACK: &str = "*Reboot*";
const FACTORY_ACK: &str = "Set Factory Defaults";
const EXIT_ACK: &str = "EXIT";
const SET_ACK: &str = "OK";

/// Commands whose argument must never reach the log.
const SECRET_COMMANDS: [&str; 2] = ["set w p ", "set a p "];

pub struct WiflyModule<S, C> {
    serial: S,
    clock: C,
    timeout_ms: u32,
    command_mode: bool,
    trace: bool,
}

impl<S: SerialPort, C: TimePort> WiflyModule<S, C> {
    pub fn new(serial: S, clock: C, timeout_ms: u32) -> Self {
        Self {
            serial,
            clock,
            timeout_ms,
            command_mode: false,
            trace: false,
        }
    }

    /// Log every command sent to the module at `debug!` level.
    #[must_use]
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn in_command_mode(&self) -> bool {
        self.command_mode
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    fn enter_command_mode(&mut self) -> Result<(), TransportError> {
        if self.command_mode {
            return Ok(());
        }
        self.serial.write(ENTER_COMMAND_MODE)?;
        self.await_text(COMMAND_PROMPT)?;
        self.command_mode = true;
        Ok(())
    }

    /// Consume input until `expected` has been seen or the deadline passes.
    fn await_text(&mut self, expected: &str) -> Result<(), TransportError> {
        let deadline = self.clock.now_ms() + u64::from(self.timeout_ms);
        let mut scanner = MarkerScanner::new(expected);
        loop {
            while let Some(b) = self.serial.read_byte() {
                if scanner.push(b) {
                    return Ok(());
                }
            }
            if self.clock.now_ms() > deadline {
                warn!("wifly: no '{}' within {} ms", expected, self.timeout_ms);
                return Err(TransportError::Timeout);
            }
            idle();
        }
    }

    fn read_exact(&mut self, out: &mut [u8]) -> Result<(), TransportError> {
        let deadline = self.clock.now_ms() + u64::from(self.timeout_ms);
        let mut filled = 0;
        while filled < out.len() {
            match self.serial.read_byte() {
                Some(b) => {
                    out[filled] = b;
                    filled += 1;
                }
                None if self.clock.now_ms() > deadline => {
                    warn!("wifly: value truncated at {}/{} bytes", filled, out.len());
                    return Err(TransportError::Timeout);
                }
                None => idle(),
            }
        }
        Ok(())
    }

    fn trace_command(&self, command: &str) {
        if !self.trace {
            return;
        }
        match SECRET_COMMANDS.iter().find(|p| command.starts_with(*p)) {
            Some(prefix) => debug!("wifly > {}****", prefix),
            None => debug!("wifly > {}", command),
        }
    }

    /// Run `f` in command mode and return to data mode afterwards if the
    /// module was in data mode before.
    fn in_command_mode_then_restore(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), TransportError>,
    ) -> Result<(), TransportError> {
        let was_data_mode = !self.command_mode;
        f(self)?;
        if was_data_mode {
            self.enter_data_mode()?;
        }
        Ok(())
    }
}

impl<S: SerialPort, C: TimePort> ModulePort for WiflyModule<S, C> {
    fn available(&self) -> usize {
        self.serial.available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.serial.read_byte()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.serial.write(data)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.send_command("factory RESET", Some(FACTORY_ACK))?;
        self.reboot()
    }

    fn send_command(&mut self, command: &str, ack: Option<&str>) -> Result<(), TransportError> {
        self.enter_command_mode()?;
        self.trace_command(command);
        self.serial.write(command.as_bytes())?;
        self.serial.write(b"\r")?;
        match ack {
            Some(ack) => self.await_text(ack),
            None => Ok(()),
        }
    }

    fn query(&mut self, command: &str, prefix: &str, out: &mut [u8]) -> Result<(), TransportError> {
        self.send_command(command, Some(prefix))?;
        self.read_exact(out)
    }

    fn save(&mut self) -> Result<(), TransportError> {
        self.send_command("save", Some(SAVE_ACK))
    }

    fn reboot(&mut self) -> Result<(), TransportError> {
        self.send_command("reboot", Some(REBOOT_ACK))?;
        // The module restarts in data mode.
        self.command_mode = false;
        Ok(())
    }

    fn enter_data_mode(&mut self) -> Result<(), TransportError> {
        if !self.command_mode {
            return Ok(());
        }
        self.send_command("exit", Some(EXIT_ACK))?;
        self.command_mode = false;
        // Drop leftover prompt chatter so it cannot prefix the first message.
        self.flush();
        Ok(())
    }

    fn flush(&mut self) {
        let mut dropped = 0usize;
        while self.serial.read_byte().is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("wifly: flushed {} bytes", dropped);
        }
    }

    fn sleep_after(&mut self, secs: u16) -> Result<(), TransportError> {
        self.in_command_mode_then_restore(|m| {
            m.send_command(&format!("set s s {secs}"), Some(SET_ACK))
        })
    }

    fn wake(&mut self) -> Result<(), TransportError> {
        // Any UART activity wakes the module; the sleep timer is then
        // cleared so it stays awake.
        self.serial.write(b"\r")?;
        self.in_command_mode_then_restore(|m| m.send_command("set s s 0", Some(SET_ACK)))
    }
}

/// Give up the CPU while waiting for module output.
#[cfg(target_os = "espidf")]
fn idle() {
    // One tick lets the idle task feed the watchdog.
    esp_idf_hal::delay::FreeRtos::delay_ms(1);
}

#[cfg(not(target_os = "espidf"))]
fn idle() {
    std::thread::yield_now();
}
