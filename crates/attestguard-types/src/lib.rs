//! Stable DTOs and IDs used across the attestguard workspace.
//!
//! This crate is intentionally boring:
//! - policy and policy-group documents as authored by users
//! - attachments as declared in crafting schemas
//! - the `PolicyEvaluation` record embedded in attestations
//! - the error taxonomy shared by every layer

#![forbid(unsafe_code)]

pub mod error;
pub mod evaluation;
pub mod ids;
pub mod policy;
pub mod predicate;

pub use error::{BindingError, EngineError, ErrorKind, LoadError, PolicyError};
pub use evaluation::{PolicyEvaluation, ResourceRef, Verdict, Violation};
pub use policy::{
    EvalPhase, GroupMaterial, GroupPolicies, MaterialKind, Metadata, Policy, PolicyAttachment,
    PolicyGroup, PolicyGroupAttachment, PolicyGroupSpec, PolicyInput, PolicyKind, PolicyScript,
    PolicySource, PolicySpec,
};
pub use predicate::{
    Predicate, PolicyEvaluationMap, PredicateV02, decode_predicate, render_policy_evaluations,
};
