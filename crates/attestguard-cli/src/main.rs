//! CLI entry point for attestguard.
//!
//! This module is intentionally thin: it handles argument parsing, I/O, logging setup,
//! and exit codes. Resolution and composition live in the library crates.

use anyhow::Context;
use attestguard_domain::{GateOutcome, evaluate_gate};
use attestguard_loader::{
    HttpFetcher, HttpLookup, LoadContext, PolicyRef, ProviderCache, ProviderEndpoint,
    ProviderFetcher, Resolver,
};
use attestguard_settings::{AttestguardConfigV1, EffectiveSettings, Overrides};
use attestguard_types::{PolicyAttachment, PolicyEvaluation, PolicyGroupAttachment, ids};
use attestguard_verifier::lint_group;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "attestguard",
    version,
    about = "Resolve, lint, and gate supply-chain policy groups"
)]
struct Cli {
    /// Path to attestguard config TOML. A missing file means defaults.
    #[arg(long, default_value = "attestguard.toml")]
    config: Utf8PathBuf,

    /// Override evaluation phase (craft|push|status).
    #[arg(long)]
    phase: Option<String>,

    /// Override gate mode (enforced|advisory).
    #[arg(long)]
    gate: Option<String>,

    /// Override the HTTP timeout in seconds.
    #[arg(long)]
    http_timeout_secs: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a policy (or group) reference and print it with its provenance.
    Resolve {
        /// Reference: `[scheme://]path[@sha256:<hex>]`.
        reference: String,

        /// Treat the reference as a policy group.
        #[arg(long)]
        group: bool,

        /// Directory relative `file://` references resolve against.
        #[arg(long)]
        base_dir: Option<Utf8PathBuf>,
    },

    /// Bind a group attachment's inputs and check its skip list without evaluating.
    Lint {
        /// Group reference.
        reference: String,

        /// Group argument as `key=value`. May be repeated.
        #[arg(long = "with", value_name = "KEY=VALUE")]
        with: Vec<String>,

        /// Policy name to skip. May be repeated.
        #[arg(long)]
        skip: Vec<String>,

        /// Directory relative `file://` references resolve against.
        #[arg(long)]
        base_dir: Option<Utf8PathBuf>,
    },

    /// Decide pass/warn/fail from an attestation, a predicate, or a list of evaluations.
    Gate {
        /// Path to the JSON report.
        #[arg(long)]
        report: Utf8PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = load_settings(&cli)?;
    debug!(phase = %settings.phase, gate = ?settings.gate, "settings resolved");

    match cli.cmd {
        Commands::Resolve {
            reference,
            group,
            base_dir,
        } => cmd_resolve(&settings, &reference, group, base_dir),
        Commands::Lint {
            reference,
            with,
            skip,
            base_dir,
        } => cmd_lint(&settings, reference, &with, skip, base_dir),
        Commands::Gate { report } => cmd_gate(&settings, &report),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> anyhow::Result<EffectiveSettings> {
    // Missing config is allowed; defaults apply.
    let cfg_text = std::fs::read_to_string(&cli.config).unwrap_or_default();
    let cfg = if cfg_text.trim().is_empty() {
        AttestguardConfigV1::default()
    } else {
        attestguard_settings::parse_config_toml(&cfg_text)
            .with_context(|| format!("parse config: {}", cli.config))?
    };

    let overrides = Overrides {
        phase: cli.phase.clone(),
        gate: cli.gate.clone(),
        http_timeout_secs: cli.http_timeout_secs,
    };
    attestguard_settings::resolve_settings(cfg, overrides).context("resolve config")
}

fn build_resolver(settings: &EffectiveSettings) -> anyhow::Result<Resolver> {
    let http = HttpFetcher::with_timeout(settings.http_timeout)?;
    if settings.providers.is_empty() {
        return Ok(Resolver::new(http, None));
    }

    let mut endpoints = BTreeMap::new();
    for (name, provider) in &settings.providers {
        let token = match provider.token_env.as_deref() {
            Some(var) => {
                let token = std::env::var(var).ok();
                if token.is_none() {
                    warn!(provider = %name, env = %var, "provider token variable is not set");
                }
                token
            }
            None => None,
        };
        endpoints.insert(
            name.clone(),
            ProviderEndpoint {
                url: provider.url.clone(),
                token,
            },
        );
    }

    let lookup = HttpLookup::new(
        endpoints,
        settings.default_provider.clone(),
        Some(settings.http_timeout),
    )?;
    let provider = ProviderFetcher::new(Arc::new(lookup), Arc::new(ProviderCache::new()));
    Ok(Resolver::new(http, Some(provider)))
}

fn cmd_resolve(
    settings: &EffectiveSettings,
    reference: &str,
    group: bool,
    base_dir: Option<Utf8PathBuf>,
) -> anyhow::Result<()> {
    let resolver = build_resolver(settings)?;

    let output = if group {
        let attachment = PolicyGroupAttachment::new(reference);
        let loaded = resolver.resolve_group(&attachment, base_dir.as_deref())?;
        json!({
            "reference": loaded.reference,
            "group": loaded.group,
        })
    } else {
        // Parse first so reference errors are reported as such.
        PolicyRef::parse(reference)?;
        let ctx = LoadContext::policy().with_base_dir(base_dir);
        let loaded = resolver.resolve_policy(&PolicyAttachment::by_ref(reference), &ctx)?;
        let sources: Vec<JsonValue> = loaded
            .sources
            .iter()
            .map(|s| {
                json!({
                    "kind": s.kind,
                    "type": s.material_kind,
                    "bytes": s.body.len(),
                })
            })
            .collect();
        json!({
            "reference": loaded.reference,
            "policy": loaded.policy,
            "sources": sources,
        })
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn cmd_lint(
    settings: &EffectiveSettings,
    reference: String,
    with: &[String],
    skip: Vec<String>,
    base_dir: Option<Utf8PathBuf>,
) -> anyhow::Result<()> {
    let resolver = build_resolver(settings)?;
    let attachment = PolicyGroupAttachment {
        reference,
        with: parse_with(with)?,
        skip,
    };

    let lint = lint_group(&resolver, &attachment, base_dir.as_deref())?;
    for name in &lint.unknown_skips {
        eprintln!("attestguard: skip entry {name:?} does not match any policy in the group");
    }

    let output = json!({
        "group": lint.group,
        "bindings": lint.bindings,
        "materials": lint.materials,
        "policies": lint.policies,
        "unknownSkips": lint.unknown_skips,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_with(pairs: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("--with expects KEY=VALUE, got {pair:?}"))?;
        if key.trim().is_empty() {
            anyhow::bail!("--with has an empty key: {pair:?}");
        }
        out.insert(key.trim().to_string(), value.to_string());
    }
    Ok(out)
}

fn cmd_gate(settings: &EffectiveSettings, report_path: &Utf8Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(report_path)
        .with_context(|| format!("read report: {report_path}"))?;
    let value: JsonValue = serde_json::from_str(&text).context("parse report json")?;
    let evaluations = read_evaluations(&value)?;

    let outcome = evaluate_gate(&evaluations, settings.gate);
    println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);

    let code = gate_exit_code(&outcome);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Accepts an in-toto statement, a bare predicate, or a JSON array of evaluations.
fn read_evaluations(value: &JsonValue) -> anyhow::Result<Vec<PolicyEvaluation>> {
    if value.is_array() {
        return serde_json::from_value(value.clone()).context("parse evaluation list");
    }

    let (predicate_type, body) = match (value.get("predicateType"), value.get("predicate")) {
        (Some(JsonValue::String(t)), Some(body)) => (t.as_str(), body),
        _ => (ids::PREDICATE_TYPE_V02, value),
    };
    let predicate = attestguard_types::decode_predicate(predicate_type, body)?;
    Ok(predicate.all_evaluations().into_iter().cloned().collect())
}

fn outcome_json(outcome: &GateOutcome) -> JsonValue {
    json!({
        "verdict": outcome.verdict,
        "evaluated": outcome.evaluated,
        "skipped": outcome.skipped,
        "violated": outcome.violated,
    })
}

fn gate_exit_code(outcome: &GateOutcome) -> i32 {
    match outcome.verdict {
        attestguard_types::Verdict::Pass | attestguard_types::Verdict::Warn => 0,
        attestguard_types::Verdict::Fail => 2,
    }
}
