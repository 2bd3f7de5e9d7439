//! Evidence seam: what the orchestrator needs from a crafted material.

use attestguard_types::{LoadError, MaterialKind, PolicyError, ids};
use camino::Utf8Path;
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;

pub trait Evidence {
    /// JSON-encoded content handed to the rule engine.
    ///
    /// `path` points at the material's downloaded content when it lives outside
    /// the descriptor (SBOMs, scan reports).
    fn evaluable_content(&self, path: Option<&Utf8Path>) -> Result<Vec<u8>, PolicyError>;

    fn material_type(&self) -> MaterialKind;

    /// Name the material was declared with in the crafting schema.
    fn identifier(&self) -> &str;
}

/// A crafted material as recorded in an attestation.
#[derive(Clone, Debug, PartialEq)]
pub struct CraftedMaterial {
    pub name: String,
    pub kind: MaterialKind,
    /// `sha256:<hex>` of the content, when content-addressed.
    pub digest: Option<String>,
    /// Inline value for materials without a file (strings, image refs).
    pub value: Option<String>,
    pub annotations: BTreeMap<String, String>,
}

impl CraftedMaterial {
    pub fn new(name: impl Into<String>, kind: MaterialKind) -> Self {
        Self {
            name: name.into(),
            kind,
            digest: None,
            value: None,
            annotations: BTreeMap::new(),
        }
    }

    fn descriptor(&self) -> JsonValue {
        json!({
            "name": self.name,
            "type": self.kind.as_str(),
            "digest": self.digest,
            "value": self.value,
            "annotations": self.annotations,
        })
    }
}

impl Evidence for CraftedMaterial {
    /// File content when a path is given, the inline value otherwise.
    ///
    /// JSON objects get the material descriptor injected under `chainloop_metadata`
    /// so policies can check names and annotations; other content passes through.
    fn evaluable_content(&self, path: Option<&Utf8Path>) -> Result<Vec<u8>, PolicyError> {
        let raw = match path {
            Some(p) => std::fs::read(p).map_err(|e| {
                PolicyError::load(format!("file://{p}"), LoadError::Io(e))
            })?,
            None => match &self.value {
                Some(v) => serde_json::to_vec(&JsonValue::String(v.clone()))
                    .map_err(|e| PolicyError::spec(&self.name, e.to_string()))?,
                None => {
                    return Err(PolicyError::spec(
                        &self.name,
                        "material has neither content nor value",
                    ));
                }
            },
        };

        let Ok(JsonValue::Object(mut object)) = serde_json::from_slice::<JsonValue>(&raw) else {
            return Ok(raw);
        };
        object.insert(ids::EVALUABLE_METADATA_FIELD.to_string(), self.descriptor());
        serde_json::to_vec(&JsonValue::Object(object))
            .map_err(|e| PolicyError::spec(&self.name, e.to_string()))
    }

    fn material_type(&self) -> MaterialKind {
        self.kind.clone()
    }

    fn identifier(&self) -> &str {
        &self.name
    }
}
