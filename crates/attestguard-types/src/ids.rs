//! Stable identifiers for documents, schemes, and well-known keys.

// Document kinds
pub const KIND_POLICY: &str = "Policy";
pub const KIND_POLICY_GROUP: &str = "PolicyGroup";
pub const API_VERSION_V1: &str = "workflowcontract.chainloop.dev/v1";

// Reference schemes
pub const SCHEME_FILE: &str = "file";
pub const SCHEME_HTTP: &str = "http";
pub const SCHEME_HTTPS: &str = "https";
pub const SCHEME_CHAINLOOP: &str = "chainloop";

/// Only supported digest algorithm for pinned references.
pub const DIGEST_SHA256: &str = "sha256";

// Material kinds referenced by the engine itself
pub const MATERIAL_ATTESTATION: &str = "ATTESTATION";
pub const MATERIAL_SBOM_CYCLONEDX_JSON: &str = "SBOM_CYCLONEDX_JSON";
pub const MATERIAL_SBOM_SPDX_JSON: &str = "SBOM_SPDX_JSON";
pub const MATERIAL_SARIF: &str = "SARIF";
pub const MATERIAL_CONTAINER_IMAGE: &str = "CONTAINER_IMAGE";
pub const MATERIAL_STRING: &str = "STRING";
pub const MATERIAL_ARTIFACT: &str = "ARTIFACT";

/// Key under which attestation-level evaluations are rendered in the predicate.
pub const ATTESTATION_EVALUATIONS_KEY: &str = "CHAINLOOP_ATTESTATION";

/// Field injected into evaluable material content with the material descriptor.
pub const EVALUABLE_METADATA_FIELD: &str = "chainloop_metadata";

// Predicate types
pub const PREDICATE_TYPE_V02: &str = "chainloop.dev/attestation/v0.2";
