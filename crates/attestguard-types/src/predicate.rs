//! Attestation predicate decoding.
//!
//! Predicates are decoded through an explicit table keyed by predicate type. Each
//! decoder owns its field mapping, including fallbacks for deprecated keys.

use crate::error::PolicyError;
use crate::evaluation::PolicyEvaluation;
use crate::ids;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Evaluations keyed by material name, plus [`ids::ATTESTATION_EVALUATIONS_KEY`].
pub type PolicyEvaluationMap = BTreeMap<String, Vec<PolicyEvaluation>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredicateV02 {
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    pub metadata: JsonValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<JsonValue>,
    #[serde(default)]
    pub policy_evaluations: PolicyEvaluationMap,
    #[serde(default)]
    pub policy_has_violations: bool,
}

/// A decoded predicate, tagged by the predicate type it was read as.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    V02(PredicateV02),
}

impl Predicate {
    pub fn predicate_type(&self) -> &'static str {
        match self {
            Predicate::V02(_) => ids::PREDICATE_TYPE_V02,
        }
    }

    pub fn policy_evaluations(&self) -> &PolicyEvaluationMap {
        match self {
            Predicate::V02(p) => &p.policy_evaluations,
        }
    }

    /// All evaluations, flattened in key order.
    pub fn all_evaluations(&self) -> Vec<&PolicyEvaluation> {
        self.policy_evaluations().values().flatten().collect()
    }
}

type Decoder = fn(&JsonValue) -> Result<Predicate, PolicyError>;

const DECODERS: &[(&str, Decoder)] = &[(ids::PREDICATE_TYPE_V02, decode_v02)];

/// Decode a raw predicate body using the decoder registered for `predicate_type`.
pub fn decode_predicate(predicate_type: &str, raw: &JsonValue) -> Result<Predicate, PolicyError> {
    let Some((_, decode)) = DECODERS.iter().find(|(t, _)| *t == predicate_type) else {
        return Err(PolicyError::spec(
            predicate_type,
            format!(
                "unsupported predicate type (known: {})",
                DECODERS
                    .iter()
                    .map(|(t, _)| *t)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ));
    };
    decode(raw)
}

fn decode_v02(raw: &JsonValue) -> Result<Predicate, PolicyError> {
    let Some(obj) = raw.as_object() else {
        return Err(PolicyError::spec(
            ids::PREDICATE_TYPE_V02,
            "predicate must be a JSON object",
        ));
    };

    let mut normalized = obj.clone();
    // `policy_evaluations` is the deprecated spelling; only consulted when the
    // current key is absent.
    if !normalized.contains_key("policyEvaluations")
        && let Some(legacy) = normalized.remove("policy_evaluations")
    {
        normalized.insert("policyEvaluations".to_string(), legacy);
    }

    let mut predicate: PredicateV02 = serde_json::from_value(JsonValue::Object(normalized))
        .map_err(|e| PolicyError::spec(ids::PREDICATE_TYPE_V02, e.to_string()))?;
    predicate.policy_has_violations |= predicate
        .policy_evaluations
        .values()
        .flatten()
        .any(PolicyEvaluation::has_violations);
    Ok(Predicate::V02(predicate))
}

/// Group evaluations the way they are embedded in the predicate.
///
/// Material-level evaluations are keyed by material name; evaluations without a
/// material name are attestation-level and land under the fixed attestation key.
pub fn render_policy_evaluations<I>(evaluations: I) -> PolicyEvaluationMap
where
    I: IntoIterator<Item = PolicyEvaluation>,
{
    let mut out = PolicyEvaluationMap::new();
    for eval in evaluations {
        let key = if eval.material_name.is_empty() {
            ids::ATTESTATION_EVALUATIONS_KEY.to_string()
        } else {
            eval.material_name.clone()
        };
        out.entry(key).or_default().push(eval);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Violation;
    use serde_json::json;

    fn eval(name: &str, material: &str, violated: bool) -> PolicyEvaluation {
        PolicyEvaluation {
            name: name.to_string(),
            material_name: material.to_string(),
            violations: if violated {
                vec![Violation {
                    subject: name.to_string(),
                    message: "failed".to_string(),
                }]
            } else {
                Vec::new()
            },
            ..PolicyEvaluation::default()
        }
    }

    #[test]
    fn decodes_current_key() {
        let raw = json!({
            "policyEvaluations": { "sbom": [{ "name": "sbom-present", "materialName": "sbom", "violations": [] }] }
        });
        let predicate = decode_predicate(ids::PREDICATE_TYPE_V02, &raw).expect("decode");
        assert_eq!(predicate.all_evaluations().len(), 1);
        assert_eq!(predicate.predicate_type(), ids::PREDICATE_TYPE_V02);
    }

    #[test]
    fn falls_back_to_deprecated_key_only_when_current_is_absent() {
        let legacy_only = json!({
            "policy_evaluations": { "sbom": [{ "name": "legacy", "violations": [] }] }
        });
        let predicate = decode_predicate(ids::PREDICATE_TYPE_V02, &legacy_only).expect("decode");
        assert_eq!(predicate.all_evaluations()[0].name, "legacy");

        let both = json!({
            "policyEvaluations": { "sbom": [{ "name": "current", "violations": [] }] },
            "policy_evaluations": { "sbom": [{ "name": "legacy", "violations": [] }] }
        });
        let predicate = decode_predicate(ids::PREDICATE_TYPE_V02, &both).expect("decode");
        let names: Vec<_> = predicate.all_evaluations().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["current".to_string()]);
    }

    #[test]
    fn derives_violation_flag() {
        let raw = json!({
            "policyEvaluations": {
                "sbom": [{ "name": "p", "violations": [{ "subject": "p", "message": "bad" }] }]
            }
        });
        let Predicate::V02(p) = decode_predicate(ids::PREDICATE_TYPE_V02, &raw).expect("decode");
        assert!(p.policy_has_violations);
    }

    #[test]
    fn rejects_unknown_predicate_type() {
        let err = decode_predicate("example.com/v9", &json!({})).expect_err("unknown type");
        assert!(err.to_string().contains("unsupported predicate type"));
    }

    #[test]
    fn renders_attestation_level_under_fixed_key() {
        let map = render_policy_evaluations(vec![
            eval("sbom-present", "sbom", false),
            eval("approved", "", true),
            eval("sbom-fresh", "sbom", false),
        ]);
        assert_eq!(map["sbom"].len(), 2);
        assert_eq!(map[ids::ATTESTATION_EVALUATIONS_KEY][0].name, "approved");
    }
}
