//! Interrupt → main-loop handoff primitives.
//!
//! Interrupt handlers (zero-crossing, pin-change, timer compare) only ever
//! set a flag or bump a counter; the next `update()` consumes it. No
//! multi-step state changes happen in interrupt context, so plain
//! atomics are enough and no lock is needed.
//!
//! ```text
//! ┌─────────────┐   set()/bump()   ┌──────────┐   take()   ┌──────────────┐
//! │ GPIO ISR    │─────────────────▶│  atomic  │───────────▶│  update()    │
//! │ Timer ISR   │                  │          │            │  (consumer)  │
//! └─────────────┘                  └──────────┘            └──────────────┘
//! ```
//!
//! Both types are `const`-constructible so they can live in a `static`
//! that the ISR and the main loop share.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Single-bit event raised by an ISR and consumed by the main loop.
pub struct IsrFlag(AtomicBool);

impl IsrFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Raise the flag. Safe to call from interrupt context.
    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Consume the flag, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    /// Inspect without consuming.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for IsrFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts ISR occurrences between two main-loop polls (e.g. rotary
/// encoder steps, zero-crossings).
pub struct IsrCounter(AtomicU32);

impl IsrCounter {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Record one occurrence. Wraps on overflow.
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    /// Return the count since the last `take` and reset it.
    pub fn take(&self) -> u32 {
        self.0.swap(0, Ordering::AcqRel)
    }

    pub fn peek(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for IsrCounter {
    fn default() -> Self {
        Self::new()
    }
}
