//! Argument binding and template interpolation.

use attestguard_types::{BindingError, PolicyInput};
use std::collections::BTreeMap;

/// Flat string-to-string argument set handed to the rule engine.
pub type Bindings = BTreeMap<String, String>;

/// Merge declared inputs with caller-supplied values.
///
/// Caller values win. Missing inputs fall back to their default; a required input
/// with neither a value nor a default is an error. Caller keys that are not
/// declared are passed through untouched.
pub fn bind_inputs(
    inputs: &[PolicyInput],
    with: &BTreeMap<String, String>,
) -> Result<Bindings, BindingError> {
    let mut bound: Bindings = with.clone();
    for input in inputs {
        if bound.contains_key(&input.name) {
            continue;
        }
        match &input.default {
            Some(default) => {
                bound.insert(input.name.clone(), default.clone());
            }
            None if input.required => return Err(BindingError::MissingInput(input.name.clone())),
            None => {}
        }
    }
    Ok(bound)
}

/// Layer attachment-local arguments on top of group bindings.
///
/// Local values are interpolated against `base` first, then override it.
pub fn merge_arguments(
    base: &Bindings,
    local: &BTreeMap<String, String>,
) -> Result<Bindings, BindingError> {
    let mut merged = base.clone();
    for (key, value) in local {
        merged.insert(key.clone(), interpolate(value, base)?);
    }
    Ok(merged)
}

/// Substitute `{{ name }}` placeholders from `bindings`.
///
/// Accepted spellings: `{{name}}`, `{{ inputs.name }}`, `{{ .inputs.name }}`.
/// Text without a closing `}}` is left as-is.
pub fn interpolate(value: &str, bindings: &Bindings) -> Result<String, BindingError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);

        let inner = &rest[start + 2..start + 2 + len];
        let key = placeholder_key(inner);
        match bindings.get(key) {
            Some(v) => out.push_str(v),
            None => {
                return Err(BindingError::UnresolvedPlaceholder {
                    placeholder: inner.trim().to_string(),
                    value: value.to_string(),
                });
            }
        }
        rest = &rest[start + 2 + len + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn placeholder_key(inner: &str) -> &str {
    let key = inner.trim();
    let key = key.strip_prefix('.').unwrap_or(key);
    key.strip_prefix("inputs.").unwrap_or(key)
}
