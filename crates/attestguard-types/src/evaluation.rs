use crate::policy::MaterialKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single rule-engine reported failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Violation {
    pub subject: String,
    pub message: String,
}

/// Provenance of a loaded policy or group: where it came from and what it hashed to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub name: String,
    /// Reference URI without the digest suffix.
    pub uri: String,
    /// `sha256:<hex>` of the loaded bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
}

/// Outcome of evaluating one policy against one subject.
///
/// Created once during orchestration and never mutated after being returned.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEvaluation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Evidence the policy ran against. Empty for attestation-level policies.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub material_name: String,
    /// Arguments declared on the attachment, after interpolation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MaterialKind>,
    #[serde(default)]
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_reference: Option<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_reference: Option<ResourceRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
}

impl PolicyEvaluation {
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }
}

/// Gate outcome over a set of evaluations. Maps cleanly to CI exit codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}
