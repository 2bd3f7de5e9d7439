//! Base verifier: one policy attachment against one subject.

use crate::engine::{EngineOutput, RuleEngine};
use crate::evidence::Evidence;
use attestguard_domain::{
    Bindings, attachment_applies, bind_inputs, merge_arguments, phase_allows,
};
use attestguard_loader::{LoadContext, LoadedPolicy, Resolver};
use attestguard_types::{
    EvalPhase, MaterialKind, PolicyAttachment, PolicyError, PolicyEvaluation,
};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

/// What a subject is and where its attachment was declared.
#[derive(Clone, Debug)]
pub struct EvalOptions {
    /// Material type of the subject; `ATTESTATION` for statements.
    pub kind: MaterialKind,
    /// Evidence identifier. Empty for attestation-level policies.
    pub material_name: String,
    /// Arguments bound at group level, if the attachment came from a group.
    pub group_args: Bindings,
    /// Directory relative references resolve against.
    pub base_dir: Option<Utf8PathBuf>,
}

impl EvalOptions {
    pub fn material(kind: MaterialKind, material_name: impl Into<String>) -> Self {
        Self {
            kind,
            material_name: material_name.into(),
            group_args: Bindings::new(),
            base_dir: None,
        }
    }

    pub fn attestation() -> Self {
        Self::material(MaterialKind::attestation(), "")
    }

    pub fn with_group_args(mut self, args: Bindings) -> Self {
        self.group_args = args;
        self
    }

    pub fn with_base_dir(mut self, base_dir: Option<Utf8PathBuf>) -> Self {
        self.base_dir = base_dir;
        self
    }
}

pub struct PolicyVerifier {
    resolver: Arc<Resolver>,
    engine: Arc<dyn RuleEngine>,
    phase: EvalPhase,
}

impl PolicyVerifier {
    pub fn new(resolver: Arc<Resolver>, engine: Arc<dyn RuleEngine>, phase: EvalPhase) -> Self {
        Self {
            resolver,
            engine,
            phase,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn phase(&self) -> EvalPhase {
        self.phase
    }

    /// Resolve `attachment` and evaluate it against `subject`.
    ///
    /// `Ok(None)` means the policy does not apply to this subject or phase.
    pub fn evaluate(
        &self,
        attachment: &PolicyAttachment,
        subject: &[u8],
        opts: &EvalOptions,
    ) -> Result<Option<PolicyEvaluation>, PolicyError> {
        let ctx = LoadContext::policy().with_base_dir(opts.base_dir.clone());
        let loaded = self.resolver.resolve_policy(attachment, &ctx)?;
        self.evaluate_loaded(attachment, &loaded, subject, opts)
    }

    /// Evaluate an already resolved policy.
    pub fn evaluate_loaded(
        &self,
        attachment: &PolicyAttachment,
        loaded: &LoadedPolicy,
        subject: &[u8],
        opts: &EvalOptions,
    ) -> Result<Option<PolicyEvaluation>, PolicyError> {
        let name = loaded.name();
        let spec = &loaded.policy.spec;

        if !attachment_applies(attachment, &spec.type_filter(), &opts.kind) {
            debug!(policy = %name, kind = %opts.kind, "policy does not apply to material type");
            return Ok(None);
        }
        if !phase_allows(&spec.phases, self.phase) {
            debug!(policy = %name, phase = %self.phase, "policy not enabled in this phase");
            return Ok(None);
        }

        let subject_label = format!("policy {name}");
        let merged = merge_arguments(&opts.group_args, &attachment.with)
            .map_err(|e| PolicyError::binding(&subject_label, e))?;
        let bindings = bind_inputs(&spec.inputs, &merged)
            .map_err(|e| PolicyError::binding(&subject_label, e))?;

        let mut outputs = Vec::new();
        for source in &loaded.sources {
            if source
                .material_kind
                .as_ref()
                .is_some_and(|k| k != &opts.kind)
            {
                continue;
            }
            let output = self
                .engine
                .evaluate(source, subject, &bindings)
                .map_err(|source| PolicyError::Engine {
                    policy: name.to_string(),
                    source,
                })?;
            outputs.push(output);
        }
        let result = EngineOutput::merge(outputs);
        debug!(
            policy = %name,
            material = %opts.material_name,
            violations = result.violations.len(),
            skipped = result.skipped,
            "policy evaluated"
        );

        let with = attachment
            .with
            .keys()
            .filter_map(|k| merged.get_key_value(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Some(PolicyEvaluation {
            name: name.to_string(),
            description: loaded.policy.metadata.description.clone(),
            annotations: loaded.policy.metadata.annotations.clone(),
            material_name: opts.material_name.clone(),
            with,
            kind: Some(opts.kind.clone()),
            violations: result.violations,
            skipped: result.skipped,
            skip_reasons: result.skip_reasons,
            policy_reference: loaded.reference.clone(),
            group_reference: None,
            requirements: attachment.requirements.clone(),
        }))
    }

    /// Evaluate policies attached directly to a material in the crafting schema.
    pub fn verify_material(
        &self,
        attachments: &[PolicyAttachment],
        evidence: &dyn Evidence,
        content_path: Option<&Utf8Path>,
        base_dir: Option<&Utf8Path>,
    ) -> Result<Vec<PolicyEvaluation>, PolicyError> {
        let opts = EvalOptions::material(evidence.material_type(), evidence.identifier())
            .with_base_dir(base_dir.map(Utf8Path::to_path_buf));
        let ctx = LoadContext::policy().with_base_dir(opts.base_dir.clone());

        let mut content: Option<Vec<u8>> = None;
        let mut results = Vec::new();
        for attachment in attachments {
            let loaded = self.resolver.resolve_policy(attachment, &ctx)?;
            if !attachment_applies(attachment, &loaded.policy.spec.type_filter(), &opts.kind) {
                continue;
            }
            if content.is_none() {
                content = Some(evidence.evaluable_content(content_path)?);
            }
            let subject = content.as_deref().unwrap_or_default();
            results.extend(self.evaluate_loaded(attachment, &loaded, subject, &opts)?);
        }
        Ok(results)
    }

    /// Evaluate attestation-level policies attached directly in the crafting schema.
    pub fn verify_statement(
        &self,
        attachments: &[PolicyAttachment],
        statement: &JsonValue,
        base_dir: Option<&Utf8Path>,
    ) -> Result<Vec<PolicyEvaluation>, PolicyError> {
        let subject = statement_subject(statement)?;
        let opts = EvalOptions::attestation().with_base_dir(base_dir.map(Utf8Path::to_path_buf));

        let mut results = Vec::new();
        for attachment in attachments {
            results.extend(self.evaluate(attachment, &subject, &opts)?);
        }
        Ok(results)
    }
}

/// The whole statement, serialized, is the subject of attestation-level policies.
pub(crate) fn statement_subject(statement: &JsonValue) -> Result<Vec<u8>, PolicyError> {
    serde_json::to_vec(statement)
        .map_err(|e| PolicyError::spec("attestation statement", e.to_string()))
}
