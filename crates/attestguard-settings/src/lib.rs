//! Config parsing and resolution.
//!
//! This crate is intentionally IO-free: it parses and resolves configuration provided
//! as strings. Reading bearer tokens from the environment is left to the caller.

#![forbid(unsafe_code)]

mod model;
mod resolve;

pub use model::{AttestguardConfigV1, CONFIG_SCHEMA_V1, ProviderConfig};
pub use resolve::{EffectiveSettings, Overrides, ProviderSettings};

/// Parse `attestguard.toml` (or equivalent) into a typed model.
pub fn parse_config_toml(input: &str) -> anyhow::Result<AttestguardConfigV1> {
    let cfg: AttestguardConfigV1 = toml::from_str(input)?;
    Ok(cfg)
}

/// Resolve the effective settings used by the verifier (defaults + config + overrides).
pub fn resolve_settings(
    cfg: AttestguardConfigV1,
    overrides: Overrides,
) -> anyhow::Result<EffectiveSettings> {
    resolve::resolve_settings(cfg, overrides)
}
