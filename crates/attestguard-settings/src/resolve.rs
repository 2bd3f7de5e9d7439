use crate::model::{AttestguardConfigV1, CONFIG_SCHEMA_V1};
use anyhow::Context;
use attestguard_domain::GateMode;
use attestguard_types::EvalPhase;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub phase: Option<String>,
    pub gate: Option<String>,
    pub http_timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderSettings {
    pub url: String,
    pub token_env: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub phase: EvalPhase,
    pub gate: GateMode,
    pub http_timeout: Duration,
    pub providers: BTreeMap<String, ProviderSettings>,
    /// Provider used when a reference names none. A lone provider is the default.
    pub default_provider: Option<String>,
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        Self {
            phase: EvalPhase::Craft,
            gate: GateMode::Advisory,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            providers: BTreeMap::new(),
            default_provider: None,
        }
    }
}

pub fn resolve_settings(
    cfg: AttestguardConfigV1,
    overrides: Overrides,
) -> anyhow::Result<EffectiveSettings> {
    let mut effective = EffectiveSettings::default();

    if let Some(schema) = cfg.schema.as_deref()
        && schema != CONFIG_SCHEMA_V1
    {
        anyhow::bail!("unsupported config schema: {schema} (expected {CONFIG_SCHEMA_V1})");
    }

    if let Some(phase) = overrides.phase.as_deref().or(cfg.phase.as_deref()) {
        effective.phase = parse_phase(phase)?;
    }
    if let Some(gate) = overrides.gate.as_deref().or(cfg.gate.as_deref()) {
        effective.gate = parse_gate(gate)?;
    }

    match overrides.http_timeout_secs.or(cfg.http_timeout_secs) {
        Some(0) => anyhow::bail!("http_timeout_secs must be greater than zero"),
        Some(secs) => effective.http_timeout = Duration::from_secs(secs),
        None => {}
    }

    let mut defaults = Vec::new();
    for (name, provider) in cfg.providers {
        validate_url(&provider.url).with_context(|| format!("invalid url for provider {name}"))?;
        if provider.default {
            defaults.push(name.clone());
        }
        effective.providers.insert(
            name,
            ProviderSettings {
                url: provider.url,
                token_env: provider.token_env,
            },
        );
    }

    effective.default_provider = match defaults.as_slice() {
        [] if effective.providers.len() == 1 => effective.providers.keys().next().cloned(),
        [] => None,
        [one] => Some(one.clone()),
        many => anyhow::bail!("more than one default provider: {}", many.join(", ")),
    };

    Ok(effective)
}

fn parse_phase(v: &str) -> anyhow::Result<EvalPhase> {
    match v {
        "craft" => Ok(EvalPhase::Craft),
        "push" => Ok(EvalPhase::Push),
        "status" => Ok(EvalPhase::Status),
        other => anyhow::bail!("unknown phase: {other} (expected craft|push|status)"),
    }
}

fn parse_gate(v: &str) -> anyhow::Result<GateMode> {
    match v {
        "enforced" | "enforce" => Ok(GateMode::Enforced),
        "advisory" => Ok(GateMode::Advisory),
        other => anyhow::bail!("unknown gate: {other} (expected enforced|advisory)"),
    }
}

fn validate_url(url: &str) -> anyhow::Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.trim_matches('/').is_empty() => Ok(()),
        Some(_) => anyhow::bail!("{url} has no host"),
        None => anyhow::bail!("{url} is not an http(s) url"),
    }
}
