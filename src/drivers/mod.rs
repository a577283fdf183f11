//! Hardware-facing drivers that do not need a port of their own.

pub mod blink;
