//! Property-based tests for the domain crate.
//!
//! These tests use proptest to verify invariants around:
//! - Digest pinning (match always verifies, any change always fails)
//! - Applicability of unrestricted policies
//! - Skip-list bookkeeping
//! - Template interpolation and input binding

use crate::bind::{Bindings, bind_inputs, interpolate};
use crate::digest::{PinnedDigest, sha256_hex, verify_digest};
use crate::matcher::{material_block_matches, policy_applies};
use crate::skip::{is_skipped, unknown_skip_entries};
use attestguard_types::{BindingError, LoadError, MaterialKind, PolicyInput};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Strategies for generating arbitrary values
// ============================================================================

/// Strategy for material kinds, known and made-up.
fn arb_material_kind() -> impl Strategy<Value = MaterialKind> {
    prop_oneof![
        Just(MaterialKind::from("SBOM_CYCLONEDX_JSON")),
        Just(MaterialKind::from("SBOM_SPDX_JSON")),
        Just(MaterialKind::from("SARIF")),
        Just(MaterialKind::from("CONTAINER_IMAGE")),
        Just(MaterialKind::from("ATTESTATION")),
        "[A-Z][A-Z_]{0,20}".prop_map(MaterialKind::new),
    ]
}

/// Strategy for policy / input names.
fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}"
}

// ============================================================================
// Property tests: digest pinning
// ============================================================================

proptest! {
    /// Bytes always verify against their own digest.
    #[test]
    fn own_digest_always_verifies(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let pinned = PinnedDigest::parse(&format!("sha256:{}", sha256_hex(&bytes)))
            .expect("computed digest is well-formed");
        prop_assert!(verify_digest(Some(&pinned), &bytes).is_ok());
    }

    /// Appending anything to the content breaks the pin.
    #[test]
    fn modified_content_never_verifies(
        bytes in prop::collection::vec(any::<u8>(), 0..256),
        extra in prop::collection::vec(any::<u8>(), 1..16),
    ) {
        let pinned = PinnedDigest::parse(&format!("sha256:{}", sha256_hex(&bytes)))
            .expect("computed digest is well-formed");
        let mut tampered = bytes.clone();
        tampered.extend_from_slice(&extra);
        let result = verify_digest(Some(&pinned), &tampered);
        prop_assert!(
            matches!(result, Err(LoadError::DigestMismatch { .. })),
            "expected digest mismatch"
        );
    }

    /// Unpinned references never fail digest validation.
    #[test]
    fn unpinned_never_fails(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        prop_assert!(verify_digest(None, &bytes).is_ok());
    }
}

// ============================================================================
// Property tests: applicability
// ============================================================================

proptest! {
    /// An empty type filter applies to every material type.
    #[test]
    fn empty_filter_applies_to_every_kind(kind in arb_material_kind()) {
        prop_assert!(policy_applies(&[], &kind));
    }

    /// A non-empty filter applies exactly to its members.
    #[test]
    fn filter_applies_iff_member(
        filter in prop::collection::vec(arb_material_kind(), 1..4),
        kind in arb_material_kind(),
    ) {
        prop_assert_eq!(policy_applies(&filter, &kind), filter.contains(&kind));
    }

    /// An unnamed, untyped material block matches any evidence.
    #[test]
    fn wildcard_block_matches_everything(id in arb_name(), kind in arb_material_kind()) {
        prop_assert!(material_block_matches(None, None, &id, &kind));
    }
}

// ============================================================================
// Property tests: skip lists
// ============================================================================

proptest! {
    /// Unknown entries are exactly the skip names not in the known set, once each.
    #[test]
    fn unknown_entries_partition_skip_list(
        known in prop::collection::btree_set(arb_name(), 0..6),
        skip in prop::collection::vec(arb_name(), 0..8),
    ) {
        let unknown = unknown_skip_entries(&skip, &known);
        let unique: BTreeSet<&str> = unknown.iter().copied().collect();
        prop_assert_eq!(unique.len(), unknown.len());
        for name in &skip {
            prop_assert_eq!(unknown.contains(&name.as_str()), !known.contains(name));
            prop_assert!(is_skipped(&skip, name));
        }
    }
}

// ============================================================================
// Property tests: binding
// ============================================================================

proptest! {
    /// Interpolation without placeholders is the identity.
    #[test]
    fn interpolation_without_braces_is_identity(text in "[a-zA-Z0-9 ._/-]{0,40}") {
        prop_assert_eq!(interpolate(&text, &Bindings::new()).expect("no placeholders"), text);
    }

    /// Every bound placeholder is substituted regardless of spelling.
    #[test]
    fn bound_placeholders_are_substituted(
        key in arb_name(),
        value in "[a-zA-Z0-9]{0,12}",
        dotted in any::<bool>(),
    ) {
        let mut bindings = Bindings::new();
        bindings.insert(key.clone(), value.clone());
        let template = if dotted {
            format!("x-{{{{ .inputs.{key} }}}}-y")
        } else {
            format!("x-{{{{{key}}}}}-y")
        };
        prop_assert_eq!(interpolate(&template, &bindings).expect("bound"), format!("x-{value}-y"));
    }

    /// A required input without default is satisfied iff the caller supplies it.
    #[test]
    fn required_inputs_need_a_value(name in arb_name(), supplied in any::<bool>()) {
        let inputs = vec![PolicyInput {
            name: name.clone(),
            required: true,
            ..PolicyInput::default()
        }];
        let mut with = BTreeMap::new();
        if supplied {
            with.insert(name.clone(), "v".to_string());
        }
        match bind_inputs(&inputs, &with) {
            Ok(bound) => prop_assert!(supplied && bound.contains_key(&name)),
            Err(BindingError::MissingInput(missing)) => {
                prop_assert!(!supplied);
                prop_assert_eq!(missing, name);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}
