//! Application core: connectivity logic, zero I/O.
//!
//! [`CaretakerDevice`](device::CaretakerDevice) owns the provisioning
//! state machine and the message dispatch. All interaction with hardware
//! happens through **port traits** defined in [`ports`], keeping this
//! layer fully testable without real peripherals.

pub mod descriptor;
pub mod device;
pub mod events;
pub mod ports;
