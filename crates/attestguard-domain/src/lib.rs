//! Pure policy logic (no IO).
//!
//! Input: documents and attachments loaded elsewhere.
//! Output: bound arguments, applicability decisions, digests, and gate verdicts.

#![forbid(unsafe_code)]

pub mod bind;
pub mod digest;
pub mod gate;
pub mod matcher;
pub mod skip;
pub mod source;

#[cfg(test)]
mod proptest;

pub use bind::{Bindings, bind_inputs, interpolate, merge_arguments};
pub use digest::{PinnedDigest, sha256_hex, verify_digest};
pub use gate::{GateMode, GateOutcome, evaluate_gate};
pub use matcher::{attachment_applies, material_block_matches, phase_allows, policy_applies};
pub use skip::{is_skipped, unknown_skip_entries};
pub use source::detect_policy_kind;
