//! Blocking decision over a set of evaluations.

use attestguard_types::{PolicyEvaluation, Verdict};

/// Whether policy violations block attestation finalization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GateMode {
    Enforced,
    #[default]
    Advisory,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateOutcome {
    pub verdict: Verdict,
    pub evaluated: u32,
    pub skipped: u32,
    /// Names of policies that reported at least one violation, in input order.
    pub violated: Vec<String>,
}

pub fn evaluate_gate<'a, I>(evaluations: I, mode: GateMode) -> GateOutcome
where
    I: IntoIterator<Item = &'a PolicyEvaluation>,
{
    let mut evaluated = 0;
    let mut skipped = 0;
    let mut violated = Vec::new();

    for eval in evaluations {
        evaluated += 1;
        if eval.skipped {
            skipped += 1;
        }
        if eval.has_violations() && !violated.contains(&eval.name) {
            violated.push(eval.name.clone());
        }
    }

    let verdict = match (violated.is_empty(), mode) {
        (true, _) => Verdict::Pass,
        (false, GateMode::Enforced) => Verdict::Fail,
        (false, GateMode::Advisory) => Verdict::Warn,
    };

    GateOutcome {
        verdict,
        evaluated,
        skipped,
        violated,
    }
}
