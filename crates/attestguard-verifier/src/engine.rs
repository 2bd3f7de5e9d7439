//! Rule-engine seam. Rego and WASM interpreters live behind [`RuleEngine`].

use attestguard_domain::Bindings;
use attestguard_types::{EngineError, PolicySource, Violation};

/// Raw result of running one policy script against one subject.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub violations: Vec<Violation>,
    /// The script declined to evaluate the subject.
    pub skipped: bool,
    pub skip_reasons: Vec<String>,
}

impl EngineOutput {
    /// Combine the results of several scripts of the same policy.
    ///
    /// Violations and reasons accumulate; the merged result is skipped only when
    /// every part was skipped.
    pub fn merge(parts: Vec<EngineOutput>) -> EngineOutput {
        let mut merged = EngineOutput {
            skipped: !parts.is_empty(),
            ..EngineOutput::default()
        };
        for part in parts {
            merged.skipped &= part.skipped;
            merged.violations.extend(part.violations);
            merged.skip_reasons.extend(part.skip_reasons);
        }
        merged
    }
}

/// Executes policy source against a JSON subject with bound arguments.
///
/// `subject` is the JSON-encoded evaluable content of a material, or the serialized
/// attestation statement.
pub trait RuleEngine: Send + Sync {
    fn evaluate(
        &self,
        source: &PolicySource,
        subject: &[u8],
        bindings: &Bindings,
    ) -> Result<EngineOutput, EngineError>;
}
