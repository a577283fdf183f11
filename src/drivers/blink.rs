//! Status LED blink cadences.
//!
//! A pattern is a cyclic list of durations. The LED starts dark when a
//! pattern is activated and toggles each time the current duration has
//! elapsed:
//!
//! | Pattern      | Meaning                              | on / off (ms) |
//! |--------------|--------------------------------------|---------------|
//! | NewDevice    | waiting for the pairing app          | 1500 / 100    |
//! | Discovered   | pairing app connected                | 500 / 500     |
//! | FactoryReset | button held, erase pending           | 50 / 50       |
//!
//! Steady operation has no pattern and the LED stays dark.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkPattern {
    NewDevice,
    Discovered,
    FactoryReset,
}

impl BlinkPattern {
    pub const fn durations(self) -> &'static [u32] {
        match self {
            Self::NewDevice => &[1500, 100],
            Self::Discovered => &[500, 500],
            Self::FactoryReset => &[50, 50],
        }
    }
}

/// Advances the active pattern against the millisecond clock.
#[derive(Debug, Default)]
pub struct BlinkDriver {
    pattern: Option<BlinkPattern>,
    index: usize,
    next_toggle_ms: u64,
    led_on: bool,
}

impl BlinkDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch pattern (or stop blinking with `None`). The LED is turned
    /// off; the caller applies the returned level.
    pub fn activate(&mut self, pattern: Option<BlinkPattern>, now_ms: u64) -> bool {
        self.pattern = pattern;
        self.index = 0;
        self.led_on = false;
        if let Some(p) = pattern {
            self.next_toggle_ms = now_ms + u64::from(p.durations()[0]);
        }
        self.led_on
    }

    /// Returns the new LED level when it has to change.
    pub fn tick(&mut self, now_ms: u64) -> Option<bool> {
        let durations = self.pattern?.durations();
        if now_ms <= self.next_toggle_ms {
            return None;
        }
        self.led_on = !self.led_on;
        self.index = (self.index + 1) % durations.len();
        self.next_toggle_ms = now_ms + u64::from(durations[self.index]);
        Some(self.led_on)
    }

    pub fn pattern(&self) -> Option<BlinkPattern> {
        self.pattern
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }
}
