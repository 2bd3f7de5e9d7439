//! Composition layer: expand policy groups into policy evaluations.
//!
//! Each group attachment is loaded, its inputs bound, its skip list validated,
//! and its policies handed to the base verifier. Every evaluation coming out of
//! a group is stamped with the group's provenance.
//!
//! Policies are resolved only when a call needs them: the policies of matching
//! material blocks for materials, the attestation list for statements. A
//! reference that is never reached cannot fail the call.
//!
//! Group load failures are fatal for materials but only a warning for
//! statements, so that groups written for older schemas do not block pushes.

use crate::evidence::Evidence;
use crate::skip::validate_skip_list;
use crate::verifier::{EvalOptions, PolicyVerifier, statement_subject};
use attestguard_domain::{
    Bindings, attachment_applies, bind_inputs, interpolate, is_skipped, material_block_matches,
    phase_allows,
};
use attestguard_loader::{LoadContext, LoadedGroup, LoadedPolicy, Resolver};
use attestguard_types::{
    MaterialKind, PolicyAttachment, PolicyError, PolicyEvaluation, PolicyGroupAttachment,
    PolicyGroupSpec, ResourceRef,
};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, info, warn};

pub struct PolicyGroupVerifier {
    base: PolicyVerifier,
    /// Directory of the crafting schema; relative group references resolve against it.
    base_dir: Option<Utf8PathBuf>,
}

/// Position of a policy attachment inside a group spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Slot {
    /// Material block index, then attachment index within the block.
    Material(usize, usize),
    Attestation(usize),
}

/// Every attachment of a group with its slot, material blocks first.
fn slots(spec: &PolicyGroupSpec) -> impl Iterator<Item = (Slot, &PolicyAttachment)> {
    let materials = spec.materials.iter().enumerate().flat_map(|(b, block)| {
        block
            .policies
            .iter()
            .enumerate()
            .map(move |(p, att)| (Slot::Material(b, p), att))
    });
    let attestation = spec
        .policies
        .attestation
        .iter()
        .enumerate()
        .map(|(i, att)| (Slot::Attestation(i), att));
    materials.chain(attestation)
}

/// Group policies resolved on first use and kept for the rest of the call.
struct PolicySlots<'r> {
    resolver: &'r Resolver,
    ctx: LoadContext,
    resolved: HashMap<Slot, LoadedPolicy>,
}

impl<'r> PolicySlots<'r> {
    fn new(resolver: &'r Resolver, loaded: &LoadedGroup) -> Self {
        Self {
            resolver,
            ctx: LoadContext::policy().with_base_dir(loaded.base_dir.clone()),
            resolved: HashMap::new(),
        }
    }

    fn get(
        &mut self,
        slot: Slot,
        attachment: &PolicyAttachment,
    ) -> Result<&LoadedPolicy, PolicyError> {
        match self.resolved.entry(slot) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let loaded = self.resolver.resolve_policy(attachment, &self.ctx)?;
                Ok(e.insert(loaded))
            }
        }
    }
}

/// A loaded group with its inputs bound.
struct PreparedGroup<'r> {
    loaded: LoadedGroup,
    args: Bindings,
    policies: PolicySlots<'r>,
}

impl<'r> PreparedGroup<'r> {
    fn bind(
        resolver: &'r Resolver,
        loaded: LoadedGroup,
        attachment: &PolicyGroupAttachment,
    ) -> Result<Self, PolicyError> {
        let args = bind_inputs(&loaded.group.spec.inputs, &attachment.with)
            .map_err(|e| PolicyError::binding(format!("group {}", loaded.name()), e))?;
        let policies = PolicySlots::new(resolver, &loaded);
        Ok(Self {
            loaded,
            args,
            policies,
        })
    }

    fn interpolate(&self, value: &str) -> Result<String, PolicyError> {
        interpolate(value, &self.args)
            .map_err(|e| PolicyError::binding(format!("group {}", self.loaded.name()), e))
    }

    /// Warn about skip entries naming no policy of the group.
    ///
    /// Resolution failures here are logged and the policy left out of the
    /// known names; the evaluation pass reports them if it reaches them.
    fn check_skips(&mut self, skip: &[String]) {
        if skip.is_empty() {
            return;
        }
        let group = self.loaded.name();
        let mut names = Vec::new();
        for (slot, attachment) in slots(&self.loaded.group.spec) {
            match self.policies.get(slot, attachment) {
                Ok(loaded) => names.push(loaded.name().to_string()),
                Err(err) => warn!(
                    group = %group,
                    policy = %attachment.label(),
                    error = %err,
                    "policy could not be resolved while checking the skip list"
                ),
            }
        }
        validate_skip_list(group, skip, names.iter().map(String::as_str));
    }
}

/// Static view of a group attachment: what it binds to and what it would skip.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupLint {
    pub group: ResourceRef,
    pub bindings: Bindings,
    /// Material block selectors after interpolation (`name`, or `type:<KIND>`, or `*`).
    pub materials: Vec<String>,
    /// Resolved policy names, material blocks first.
    pub policies: Vec<String>,
    /// Skip entries that name no policy of the group.
    pub unknown_skips: Vec<String>,
}

impl PolicyGroupVerifier {
    pub fn new(base: PolicyVerifier) -> Self {
        Self {
            base,
            base_dir: None,
        }
    }

    pub fn with_base_dir(mut self, base_dir: Option<Utf8PathBuf>) -> Self {
        self.base_dir = base_dir;
        self
    }

    pub fn base(&self) -> &PolicyVerifier {
        &self.base
    }

    /// Evaluate every group policy that targets `evidence`.
    ///
    /// Any failure aborts the call. Only the policies of matching material
    /// blocks are resolved. The evidence content is loaded at most once, and
    /// only when at least one policy applies.
    pub fn verify_material(
        &self,
        groups: &[PolicyGroupAttachment],
        evidence: &dyn Evidence,
        content_path: Option<&Utf8Path>,
    ) -> Result<Vec<PolicyEvaluation>, PolicyError> {
        let kind = evidence.material_type();
        let id = evidence.identifier();
        let mut content: Option<Vec<u8>> = None;
        let mut results = Vec::new();

        for attachment in groups {
            let loaded = self.load(attachment)?;
            let Some(mut group) = self.prepare(loaded, attachment)? else {
                continue;
            };

            let opts = EvalOptions::material(kind.clone(), id)
                .with_group_args(group.args.clone())
                .with_base_dir(group.loaded.base_dir.clone());
            let before = results.len();

            for (b, block) in group.loaded.group.spec.materials.iter().enumerate() {
                let name = block
                    .name
                    .as_deref()
                    .map(|n| group.interpolate(n))
                    .transpose()?;
                if !material_block_matches(name.as_deref(), block.kind.as_ref(), id, &kind) {
                    continue;
                }

                for (p, policy_att) in block.policies.iter().enumerate() {
                    let loaded = group.policies.get(Slot::Material(b, p), policy_att)?;
                    if !selected(attachment, policy_att, loaded, &kind, group.loaded.name()) {
                        continue;
                    }
                    if content.is_none() {
                        content = Some(evidence.evaluable_content(content_path)?);
                    }
                    let subject = content.as_deref().unwrap_or_default();
                    let eval = self.base.evaluate_loaded(policy_att, loaded, subject, &opts)?;
                    if let Some(eval) = eval {
                        results.push(stamp(eval, &group.loaded.reference));
                    }
                }
            }

            info!(
                group = %group.loaded.name(),
                material = %id,
                evaluations = results.len() - before,
                "group evaluated for material"
            );
        }
        Ok(results)
    }

    /// Evaluate every group's attestation-level policies against the statement.
    ///
    /// A group that fails to load is logged and skipped; later failures abort.
    /// Material-block policies are never resolved here, except by the skip check.
    pub fn verify_statement(
        &self,
        groups: &[PolicyGroupAttachment],
        statement: &JsonValue,
    ) -> Result<Vec<PolicyEvaluation>, PolicyError> {
        let kind = MaterialKind::attestation();
        let mut subject: Option<Vec<u8>> = None;
        let mut results = Vec::new();

        for attachment in groups {
            let loaded = match self.load(attachment) {
                Ok(loaded) => loaded,
                Err(err) => {
                    warn!(
                        group = %attachment.reference,
                        error = %err,
                        "skipping policy group that failed to load"
                    );
                    continue;
                }
            };
            let Some(mut group) = self.prepare(loaded, attachment)? else {
                continue;
            };

            let opts = EvalOptions::attestation()
                .with_group_args(group.args.clone())
                .with_base_dir(group.loaded.base_dir.clone());
            let before = results.len();

            let attestation = &group.loaded.group.spec.policies.attestation;
            for (i, policy_att) in attestation.iter().enumerate() {
                let loaded = group.policies.get(Slot::Attestation(i), policy_att)?;
                if !selected(attachment, policy_att, loaded, &kind, group.loaded.name()) {
                    continue;
                }
                if subject.is_none() {
                    subject = Some(statement_subject(statement)?);
                }
                let body = subject.as_deref().unwrap_or_default();
                let eval = self.base.evaluate_loaded(policy_att, loaded, body, &opts)?;
                if let Some(eval) = eval {
                    results.push(stamp(eval, &group.loaded.reference));
                }
            }

            info!(
                group = %group.loaded.name(),
                evaluations = results.len() - before,
                "group evaluated for attestation"
            );
        }
        Ok(results)
    }

    fn load(&self, attachment: &PolicyGroupAttachment) -> Result<LoadedGroup, PolicyError> {
        self.base
            .resolver()
            .resolve_group(attachment, self.base_dir.as_deref())
    }

    /// Phase gate, input binding and skip validation for one group.
    ///
    /// `None` when the group is not enabled in the current phase.
    fn prepare(
        &self,
        loaded: LoadedGroup,
        attachment: &PolicyGroupAttachment,
    ) -> Result<Option<PreparedGroup<'_>>, PolicyError> {
        if !phase_allows(&loaded.group.spec.phases, self.base.phase()) {
            debug!(
                group = %loaded.name(),
                phase = %self.base.phase(),
                "group not enabled in this phase"
            );
            return Ok(None);
        }
        let mut group = PreparedGroup::bind(self.base.resolver(), loaded, attachment)?;
        group.check_skips(&attachment.skip);
        Ok(Some(group))
    }
}

/// Load a group attachment and describe it without running any policy.
///
/// Unlike evaluation, every policy of the group is resolved and any failure
/// is returned.
pub fn lint_group(
    resolver: &Resolver,
    attachment: &PolicyGroupAttachment,
    base_dir: Option<&Utf8Path>,
) -> Result<GroupLint, PolicyError> {
    let loaded = resolver.resolve_group(attachment, base_dir)?;
    let mut group = PreparedGroup::bind(resolver, loaded, attachment)?;

    let mut policies = Vec::new();
    for (slot, policy_att) in slots(&group.loaded.group.spec) {
        policies.push(group.policies.get(slot, policy_att)?.name().to_string());
    }
    let unknown_skips = validate_skip_list(
        group.loaded.name(),
        &attachment.skip,
        policies.iter().map(String::as_str),
    );

    let mut materials = Vec::new();
    for block in &group.loaded.group.spec.materials {
        let selector = match (block.name.as_deref(), &block.kind) {
            (Some(n), _) if !n.trim().is_empty() => group.interpolate(n)?,
            (_, Some(k)) if !k.is_empty() => format!("type:{k}"),
            _ => "*".to_string(),
        };
        materials.push(selector);
    }

    Ok(GroupLint {
        group: group.loaded.reference,
        bindings: group.args,
        materials,
        policies,
        unknown_skips,
    })
}

/// Skip list first, then the type rules. A skipped policy emits nothing.
fn selected(
    group_attachment: &PolicyGroupAttachment,
    policy_attachment: &PolicyAttachment,
    loaded: &LoadedPolicy,
    kind: &MaterialKind,
    group: &str,
) -> bool {
    if is_skipped(&group_attachment.skip, loaded.name()) {
        debug!(group = %group, policy = %loaded.name(), "policy skipped by group attachment");
        return false;
    }
    attachment_applies(policy_attachment, &loaded.policy.spec.type_filter(), kind)
}

fn stamp(mut eval: PolicyEvaluation, group: &ResourceRef) -> PolicyEvaluation {
    eval.group_reference = Some(group.clone());
    eval
}
