//! Fuzz target: `RadioMessage::parse`
//!
//! Any frame either parses into a known message type with a six-bit
//! command and the rest as payload, or is rejected with a typed error.
//! Re-packing the header of an accepted frame reproduces its first byte.
//!
//! cargo fuzz run fuzz_radio_message

#![no_main]

use caretaker::messenger::radio::{RadioMessage, header};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match RadioMessage::parse(data) {
        Ok(msg) => {
            assert_eq!(header(msg.kind, msg.command), data[0]);
            assert_eq!(msg.payload.len(), data.len() - 1);
        }
        Err(_) => assert!(data.is_empty() || data[0] >> 6 == 1),
    }
});
