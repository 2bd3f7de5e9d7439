use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Material type identifier (`SBOM_CYCLONEDX_JSON`, `CONTAINER_IMAGE`, ...).
///
/// Kept as an open string so newer crafters can introduce types without a release.
/// Values are normalized to upper case on construction and on deserialization.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct MaterialKind(String);

impl<'de> Deserialize<'de> for MaterialKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(MaterialKind::new)
    }
}

impl MaterialKind {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().trim().to_ascii_uppercase())
    }

    pub fn attestation() -> Self {
        Self::new(crate::ids::MATERIAL_ATTESTATION)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MaterialKind {
    fn from(value: &str) -> Self {
        MaterialKind::new(value)
    }
}

/// Stage of the workflow lifecycle at which policies are evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EvalPhase {
    /// Materials are being added to an in-progress attestation.
    Craft,
    /// The attestation is being finalized and pushed.
    Push,
    /// The attestation status is being queried.
    Status,
}

impl EvalPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            EvalPhase::Craft => "craft",
            EvalPhase::Push => "push",
            EvalPhase::Status => "status",
        }
    }
}

impl fmt::Display for EvalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Metadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// A declared input parameter of a policy or policy group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// `kind: Policy` document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: Metadata,
    pub spec: PolicySpec,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicySpec {
    /// Path to the policy source, relative to the declaring document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Inline Rego source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<String>,
    /// Material type the single source applies to.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MaterialKind>,
    /// Per-material-type scripts. Takes precedence over the single source.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<PolicyScript>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<PolicyInput>,
    /// Phases this policy runs in. Empty means every phase.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<EvalPhase>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyScript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MaterialKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<String>,
}

impl PolicySpec {
    /// Scripts declared by this spec, normalizing the single-source form.
    pub fn scripts(&self) -> Vec<PolicyScript> {
        if !self.policies.is_empty() {
            return self.policies.clone();
        }
        if self.path.is_none() && self.embedded.is_none() {
            return Vec::new();
        }
        vec![PolicyScript {
            kind: self.kind.clone(),
            path: self.path.clone(),
            embedded: self.embedded.clone(),
        }]
    }

    /// Material types this policy declares. Empty means "applies to every type".
    ///
    /// When any script is unrestricted the policy as a whole is unrestricted.
    pub fn type_filter(&self) -> Vec<MaterialKind> {
        let mut kinds: Vec<MaterialKind> = Vec::new();
        for script in self.scripts() {
            match script.kind {
                Some(k) if !k.is_empty() => {
                    if !kinds.contains(&k) {
                        kinds.push(k);
                    }
                }
                _ => return Vec::new(),
            }
        }
        kinds
    }
}

/// Policy body language, detected from the source bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Rego,
    Wasm,
}

/// A loaded, executable policy script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicySource {
    /// Material type this script is restricted to, if any.
    pub material_kind: Option<MaterialKind>,
    pub kind: PolicyKind,
    pub body: Vec<u8>,
}

/// A policy reference or embedded body, as attached from a schema or a group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyAttachment {
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<Box<Policy>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, String>,
    /// Narrows the attachment to one material type on top of the policy filter.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub material_type: Option<MaterialKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
}

impl PolicyAttachment {
    pub fn by_ref<S: Into<String>>(reference: S) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Self::default()
        }
    }

    pub fn embedded(policy: Policy) -> Self {
        Self {
            embedded: Some(Box::new(policy)),
            ..Self::default()
        }
    }

    /// Human-readable label for diagnostics.
    pub fn label(&self) -> String {
        match (&self.reference, &self.embedded) {
            (Some(r), _) => r.clone(),
            (None, Some(p)) => format!("embedded:{}", p.metadata.name),
            (None, None) => "<empty attachment>".to_string(),
        }
    }
}

/// `kind: PolicyGroup` document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyGroup {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: Metadata,
    pub spec: PolicyGroupSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyGroupSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<PolicyInput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<GroupMaterial>,
    #[serde(default)]
    pub policies: GroupPolicies,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<EvalPhase>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupPolicies {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attestation: Vec<PolicyAttachment>,
}

/// A material block inside a group: which evidence it targets and its policies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupMaterial {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MaterialKind>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<PolicyAttachment>,
}

impl PolicyGroup {
    /// Every policy attachment reachable from the group, material blocks first.
    pub fn all_attachments(&self) -> impl Iterator<Item = &PolicyAttachment> {
        self.spec
            .materials
            .iter()
            .flat_map(|m| m.policies.iter())
            .chain(self.spec.policies.attestation.iter())
    }
}

/// A policy group attached from a crafting schema.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyGroupAttachment {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip: Vec<String>,
}

impl PolicyGroupAttachment {
    pub fn new<S: Into<String>>(reference: S) -> Self {
        Self {
            reference: reference.into(),
            ..Self::default()
        }
    }
}
