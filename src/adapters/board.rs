//! Status LED and provisioning button over `embedded-hal` pins.
//!
//! Works with any `OutputPin` / `InputPin`: `esp_idf_hal::gpio::PinDriver`
//! on the device, mock pins on host. The button is wired active-low
//! against the internal pull-up.

use embedded_hal::digital::{InputPin, OutputPin, PinState};
use log::warn;

use crate::app::ports::BoardPort;

pub struct PinBoard<L, B> {
    led: L,
    button: B,
    led_on: bool,
}

impl<L: OutputPin, B: InputPin> PinBoard<L, B> {
    pub fn new(led: L, button: B) -> Self {
        Self {
            led,
            button,
            led_on: false,
        }
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }
}

impl<L: OutputPin, B: InputPin> BoardPort for PinBoard<L, B> {
    fn button_pressed(&mut self) -> bool {
        match self.button.is_low() {
            Ok(low) => low,
            Err(e) => {
                warn!("board: button read failed: {:?}", e);
                false
            }
        }
    }

    fn set_led(&mut self, on: bool) {
        match self.led.set_state(PinState::from(on)) {
            Ok(()) => self.led_on = on,
            Err(e) => warn!("board: LED write failed: {:?}", e),
        }
    }
}
