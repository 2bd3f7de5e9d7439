//! Fuzz target for policy and group reference parsing.
//!
//! Goal: The parser should **never panic** on any input, including
//! malformed digest suffixes and provider references.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_reference_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = attestguard_loader::fuzz::parse_reference(text);
    }
});
