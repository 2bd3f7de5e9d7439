//! Use case orchestration for attestguard.
//!
//! Two layers: [`PolicyVerifier`] evaluates one policy attachment against one
//! subject, and [`PolicyGroupVerifier`] expands policy groups on top of it. Rule
//! execution and material handling are reached through the [`RuleEngine`] and
//! [`Evidence`] traits.
//!
//! Evaluation is sequential and follows declaration order.

#![forbid(unsafe_code)]

mod engine;
mod evidence;
mod group;
mod skip;
mod verifier;

pub use engine::{EngineOutput, RuleEngine};
pub use evidence::{CraftedMaterial, Evidence};
pub use group::{GroupLint, PolicyGroupVerifier, lint_group};
pub use skip::validate_skip_list;
pub use verifier::{EvalOptions, PolicyVerifier};
