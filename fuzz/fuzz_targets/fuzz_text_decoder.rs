//! Fuzz target: `TextDecoder::push`
//!
//! Drives arbitrary byte sequences into the streaming command decoder and
//! asserts that it never panics, never yields more arguments than it
//! keeps, and re-encodes every accepted command into bytes that decode to
//! the same command.
//!
//! cargo fuzz run fuzz_text_decoder

#![no_main]

use caretaker::messenger::text::{TextDecoder, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = TextDecoder::new();

    for result in decoder.feed(data) {
        let Ok(command) = result else { continue };
        assert!(command.args.len() <= 12, "argument cap exceeded");

        // Lossy UTF-8 repair can grow a field past the decoder's limit.
        if command.args.iter().any(|a| a.len() > 96) {
            continue;
        }
        let mut again = TextDecoder::new();
        let decoded = again.feed(&encode(&command));
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().ok(), Some(&command));
    }

    // After a reset the decoder must accept bytes cleanly again.
    decoder.reset();
    let out = decoder.feed(b"3;");
    assert_eq!(out.len(), 1);
    assert!(out[0].is_ok());
});
