//! Monotonic millisecond clock.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer.
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` for
//!   host-side testing and simulation.

use crate::app::ports::TimePort;

/// Milliseconds since boot. `Copy`, so the module driver and the state
/// machine can each hold one.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl TimePort for SystemClock {
    #[cfg(target_os = "espidf")]
    fn now_ms(&self) -> u64 {
        // SAFETY: esp_timer_get_time is a read-only query, safe from any task.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
