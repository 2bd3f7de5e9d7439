//! Structural validation and decoding of loaded documents.
//!
//! Bytes are read as YAML (a superset of JSON), checked for the expected `kind`,
//! validated against the JSON schema generated from the Rust types, then
//! deserialized. Every failure is a `Spec` error naming the origin.

use attestguard_types::{Policy, PolicyError, PolicyGroup, ids};
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

pub fn decode_policy(bytes: &[u8], origin: &str) -> Result<Policy, PolicyError> {
    static SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
    decode_document(bytes, origin, ids::KIND_POLICY, &SCHEMA)
}

pub fn decode_group(bytes: &[u8], origin: &str) -> Result<PolicyGroup, PolicyError> {
    static SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
    decode_document(bytes, origin, ids::KIND_POLICY_GROUP, &SCHEMA)
}

/// Decode and validate a policy body that was embedded in another document.
pub fn validate_embedded(policy: &Policy, origin: &str) -> Result<(), PolicyError> {
    if policy.metadata.name.trim().is_empty() {
        return Err(PolicyError::spec(origin, "embedded policy has no metadata.name"));
    }
    if !policy.kind.is_empty() && policy.kind != ids::KIND_POLICY {
        return Err(PolicyError::spec(
            origin,
            format!("expected kind {:?}, found {:?}", ids::KIND_POLICY, policy.kind),
        ));
    }
    Ok(())
}

fn decode_document<T>(
    bytes: &[u8],
    origin: &str,
    expected_kind: &str,
    schema: &OnceLock<Result<jsonschema::Validator, String>>,
) -> Result<T, PolicyError>
where
    T: DeserializeOwned + JsonSchema,
{
    let value: JsonValue = serde_yaml::from_slice(bytes)
        .map_err(|e| PolicyError::spec(origin, format!("not a YAML or JSON document: {e}")))?;

    match value.get("kind").and_then(JsonValue::as_str) {
        Some(kind) if kind == expected_kind => {}
        Some(kind) => {
            return Err(PolicyError::spec(
                origin,
                format!("expected kind {expected_kind:?}, found {kind:?}"),
            ));
        }
        None => return Err(PolicyError::spec(origin, "document has no kind")),
    }

    let validator = schema
        .get_or_init(|| compile_schema::<T>())
        .as_ref()
        .map_err(|e| PolicyError::spec(origin, format!("schema unavailable: {e}")))?;
    let errors: Vec<String> = validator
        .iter_errors(&value)
        .map(|e| format!("{}: {e}", e.instance_path()))
        .collect();
    if !errors.is_empty() {
        return Err(PolicyError::spec(origin, errors.join("; ")));
    }

    let doc: T = serde_json::from_value(value).map_err(|e| PolicyError::spec(origin, e.to_string()))?;
    Ok(doc)
}

fn compile_schema<T: JsonSchema>() -> Result<jsonschema::Validator, String> {
    let schema = serde_json::to_value(schema_for!(T)).map_err(|e| e.to_string())?;
    jsonschema::draft202012::new(&schema).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestguard_types::ErrorKind;

    const POLICY: &str = r#"
apiVersion: workflowcontract.chainloop.dev/v1
kind: Policy
metadata:
  name: sbom-present
spec:
  type: SBOM_CYCLONEDX_JSON
  embedded: |
    package main
    violations := []
"#;

    #[test]
    fn decodes_yaml_policy() {
        let policy = decode_policy(POLICY.as_bytes(), "file://p.yaml").expect("decode");
        assert_eq!(policy.metadata.name, "sbom-present");
        assert_eq!(policy.spec.type_filter().len(), 1);
    }

    #[test]
    fn decodes_json_group() {
        let json = br#"{"apiVersion":"v1","kind":"PolicyGroup","metadata":{"name":"g"},"spec":{}}"#;
        let group = decode_group(json, "inline").expect("decode");
        assert_eq!(group.metadata.name, "g");
    }

    #[test]
    fn rejects_wrong_kind() {
        let err = decode_group(POLICY.as_bytes(), "file://p.yaml").expect_err("kind mismatch");
        assert_eq!(err.kind(), ErrorKind::Spec);
        assert!(err.to_string().contains("expected kind \"PolicyGroup\""));
    }

    #[test]
    fn rejects_schema_violations() {
        let bad = r#"
kind: Policy
metadata:
  name: p
spec:
  phases: [sometime]
"#;
        let err = decode_policy(bad.as_bytes(), "file://bad.yaml").expect_err("schema");
        assert_eq!(err.kind(), ErrorKind::Spec);
    }

    #[test]
    fn rejects_garbage() {
        let err = decode_policy(b":\n  - [", "file://garbage").expect_err("garbage");
        assert_eq!(err.kind(), ErrorKind::Spec);
    }
}
