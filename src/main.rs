//! Caretaker switch endpoint: Main Entry Point
//!
//! One relay, one local toggle button, an RN-XV module on UART1.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WiflyModule       NvsEeprom     PinBoard      SystemClock     │
//! │  (ModulePort)      (EepromPort)  (BoardPort)   (TimePort)      │
//! │  LogEventSink                                                  │
//! │  (EventSink)                                                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │           CaretakerDevice (pure logic)                 │    │
//! │  │  FSM · messenger · blink  ◀── RelaySwitch adapter      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use embedded_hal::digital::{OutputPin, PinState};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin, Input, InterruptType, Output, PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_hal::units::Hertz;
use log::{info, warn};

use caretaker::CaretakerDevice;
use caretaker::adapters::board::PinBoard;
use caretaker::adapters::eeprom::NvsEeprom;
use caretaker::adapters::log_sink::LogEventSink;
use caretaker::adapters::time::SystemClock;
use caretaker::adapters::uart::UartSerial;
use caretaker::app::descriptor::{DeviceAdapter, DeviceDescriptor, HandlerTable};
use caretaker::app::ports::{Platform, Ports};
use caretaker::config::DeviceConfig;
use caretaker::error::ProtocolError;
use caretaker::events::IsrCounter;
use caretaker::messenger::{Command, Outbox, WriteMode, opcode};
use caretaker::transport::WiflyModule;

/// Presses of the local toggle button since the last loop pass.
static LOCAL_PRESSES: IsrCounter = IsrCounter::new();

const LOOP_PERIOD_MS: u32 = 10;

// ── Board bundle ──────────────────────────────────────────────

struct EspBoard;

impl Platform for EspBoard {
    type Module = WiflyModule<UartSerial, SystemClock>;
    type Storage = NvsEeprom;
    type Board = PinBoard<PinDriver<'static, AnyOutputPin, Output>, PinDriver<'static, AnyInputPin, Input>>;
    type Clock = SystemClock;
    type Sink = LogEventSink;
}

// ── Relay switch adapter ──────────────────────────────────────

struct RelaySwitch<R> {
    relay: R,
    on: bool,
}

impl<R: OutputPin> RelaySwitch<R> {
    fn set(&mut self, on: bool) {
        match self.relay.set_state(PinState::from(on)) {
            Ok(()) => self.on = on,
            Err(e) => warn!("relay: write failed: {:?}", e),
        }
    }

    fn state_message(&self) -> Command {
        Command::new(opcode::SWITCH_STATE).arg(u8::from(self.on))
    }
}

fn on_switch_write<R: OutputPin>(s: &mut RelaySwitch<R>, cmd: &Command, out: &mut Outbox) {
    let value = cmd.arg_as::<u8>(2).unwrap_or(0);
    let next = match cmd.arg_as::<u8>(1).map(WriteMode::try_from) {
        Some(Ok(WriteMode::Toggle)) => !s.on,
        Some(Ok(WriteMode::Absolute)) => value != 0,
        _ => true,
    };
    s.set(next);
    out.send(s.state_message());
}

fn on_switch_read<R: OutputPin>(s: &mut RelaySwitch<R>, _cmd: &Command, out: &mut Outbox) {
    out.send(s.state_message());
}

impl<R: OutputPin> DeviceAdapter for RelaySwitch<R> {
    fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            device_type: "Switch",
            description: "Mains relay",
            led_pin: Some(2),
            button_pin: Some(0),
        }
    }

    fn register_message_handlers(&mut self, handlers: &mut HandlerTable<Self>) -> Result<(), ProtocolError> {
        handlers.attach(opcode::SWITCH_WRITE, on_switch_write::<R>)?;
        handlers.attach(opcode::SWITCH_READ, on_switch_read::<R>)
    }

    fn registration_params(&self, request: &mut Command) {
        // Channel count.
        request.push_arg(1);
    }

    fn on_operational(&mut self, out: &mut Outbox) {
        out.send(self.state_message());
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Caretaker switch v{}", env!("CARGO_PKG_VERSION"));

    let config = DeviceConfig::default();
    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    // ── 2. Module UART ────────────────────────────────────────
    let uart = UartDriver::new(
        peripherals.uart1,
        pins.gpio17,
        pins.gpio16,
        Option::<AnyInputPin>::None,
        Option::<AnyOutputPin>::None,
        &UartConfig::default().baudrate(Hertz(config.module_baud_rate)),
    )?;
    let clock = SystemClock::new();
    let module = WiflyModule::new(UartSerial::new(uart), clock, config.module_command_timeout_ms)
        .with_trace(config.features.debug_logging);

    // ── 3. Board pins ─────────────────────────────────────────
    let led = PinDriver::output(AnyOutputPin::from(pins.gpio2))?;
    let mut button = PinDriver::input(AnyInputPin::from(pins.gpio0))?;
    button.set_pull(Pull::Up)?;

    let mut local = PinDriver::input(AnyInputPin::from(pins.gpio5))?;
    local.set_pull(Pull::Up)?;
    local.set_interrupt_type(InterruptType::NegEdge)?;
    // SAFETY: the callback only bumps an atomic counter.
    unsafe { local.subscribe(|| LOCAL_PRESSES.bump())? };
    local.enable_interrupt()?;

    let relay = PinDriver::output(AnyOutputPin::from(pins.gpio4))?;

    // ── 4. Device ─────────────────────────────────────────────
    let storage = NvsEeprom::new().map_err(|e| anyhow!("NVS init failed: {}", e))?;
    let ports = Ports::<EspBoard> {
        module,
        storage,
        board: PinBoard::new(led, button),
        clock,
        sink: LogEventSink::new(),
    };
    let adapter = RelaySwitch { relay, on: false };
    let mut device = CaretakerDevice::init(config, ports, adapter)?;

    info!("System ready. Entering main loop.");

    // ── 5. Main loop ──────────────────────────────────────────
    loop {
        device.update();

        let presses = LOCAL_PRESSES.take();
        if presses > 0 {
            // Interrupts are one-shot; re-arm for the next edge.
            local.enable_interrupt()?;
            if presses % 2 == 1 {
                let sw = device.adapter_mut();
                let next = !sw.on;
                sw.set(next);
                let state = sw.state_message();
                if let Err(e) = device.send(&state) {
                    info!("local toggle not reported: {}", e);
                }
            }
        }

        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
