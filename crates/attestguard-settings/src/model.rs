use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CONFIG_SCHEMA_V1: &str = "attestguard.config.v1";

/// `attestguard.toml` schema v1.
///
/// This is a *user-facing* config model: values stay strings here and are checked
/// during resolution so error messages can name the offending key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AttestguardConfigV1 {
    /// Optional schema string for tooling (`attestguard.config.v1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Evaluation phase: `craft` (default), `push` or `status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// What violations do to the gate: `advisory` (default) or `enforced`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,

    /// Timeout for HTTP(S) loads and provider lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_timeout_secs: Option<u64>,

    /// Map of provider name -> endpoint.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderConfig {
    /// Base URL, e.g. `https://policies.example.com/v1`.
    pub url: String,

    /// Name of the environment variable that holds the bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Used for references without a `provider:` prefix.
    #[serde(default)]
    pub default: bool,
}
