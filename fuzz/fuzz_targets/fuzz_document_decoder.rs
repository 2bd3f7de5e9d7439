//! Fuzz target for policy and policy group document decoding.
//!
//! Goal: Decoding should **never panic** on any input. Non-UTF-8 bytes,
//! YAML anchors and schema violations must all surface as errors.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_document_decoder
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = attestguard_loader::fuzz::decode_document(data);
});
