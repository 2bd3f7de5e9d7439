//! Developer tasks (schema generation, fixture conformance).
//!
//! Keeping this separate avoids bloating the end-user CLI.

use anyhow::{Context, bail};
use schemars::schema_for;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the project root (parent of xtask directory).
fn project_root() -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::current_dir().expect("Cannot determine current directory")
        });

    if manifest_dir.ends_with("xtask") {
        manifest_dir
            .parent()
            .expect("xtask has no parent")
            .to_path_buf()
    } else {
        manifest_dir
    }
}

fn schemas_dir() -> PathBuf {
    project_root().join("schemas")
}

fn fixtures_dir() -> PathBuf {
    project_root().join("tests").join("fixtures")
}

/// Schema definition with its target filename.
struct SchemaSpec {
    filename: &'static str,
    generate: fn() -> schemars::Schema,
}

fn generate_policy_schema() -> schemars::Schema {
    schema_for!(attestguard_types::Policy)
}

fn generate_group_schema() -> schemars::Schema {
    schema_for!(attestguard_types::PolicyGroup)
}

fn generate_evaluation_schema() -> schemars::Schema {
    schema_for!(attestguard_types::PolicyEvaluation)
}

fn generate_config_schema() -> schemars::Schema {
    schema_for!(attestguard_settings::AttestguardConfigV1)
}

fn schema_specs() -> Vec<SchemaSpec> {
    vec![
        SchemaSpec {
            filename: "attestguard.policy.v1.json",
            generate: generate_policy_schema,
        },
        SchemaSpec {
            filename: "attestguard.policy-group.v1.json",
            generate: generate_group_schema,
        },
        SchemaSpec {
            filename: "attestguard.evaluation.v1.json",
            generate: generate_evaluation_schema,
        },
        SchemaSpec {
            filename: "attestguard.config.v1.json",
            generate: generate_config_schema,
        },
    ]
}

/// Serialize a schema to pretty-printed JSON with trailing newline.
fn serialize_schema(schema: &schemars::Schema) -> anyhow::Result<String> {
    let mut json = serde_json::to_string_pretty(schema).context("Failed to serialize schema")?;
    json.push('\n');
    Ok(json)
}

/// Emit schemas to the schemas/ directory.
fn emit_schemas() -> anyhow::Result<()> {
    let dir = schemas_dir();
    if !dir.exists() {
        fs::create_dir_all(&dir).context("Failed to create schemas directory")?;
    }

    for spec in schema_specs() {
        let schema = (spec.generate)();
        let json = serialize_schema(&schema)?;
        let path = dir.join(spec.filename);

        fs::write(&path, &json)
            .with_context(|| format!("Failed to write schema to {}", path.display()))?;

        println!("Wrote {}", path.display());
    }

    println!("\nSchemas emitted successfully.");
    Ok(())
}

/// Validate that schemas in the repo match what would be generated.
fn validate_schemas() -> anyhow::Result<()> {
    let dir = schemas_dir();
    let mut missing = Vec::new();
    let mut mismatched = Vec::new();

    for spec in schema_specs() {
        let path = dir.join(spec.filename);
        if !path.exists() {
            missing.push(spec.filename);
            continue;
        }

        let expected = serialize_schema(&(spec.generate)())?;
        let actual = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if expected != actual {
            mismatched.push(spec.filename);
        }
    }

    if missing.is_empty() && mismatched.is_empty() {
        println!("All schemas are up to date.");
        return Ok(());
    }

    if !missing.is_empty() {
        eprintln!("Missing schemas:");
        for name in &missing {
            eprintln!("  - {name}");
        }
    }
    if !mismatched.is_empty() {
        eprintln!("Schemas out of date:");
        for name in &mismatched {
            eprintln!("  - {name}");
        }
    }
    eprintln!("\nRun `cargo xtask emit-schemas` to regenerate.");
    bail!("Schema validation failed")
}

/// Fixture documents prefixed with `legacy` are expected to be rejected.
fn expects_rejection(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("legacy"))
}

fn yaml_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        ) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

type Decode = fn(&[u8], &str) -> Result<(), attestguard_types::PolicyError>;

fn decode_policy(bytes: &[u8], origin: &str) -> Result<(), attestguard_types::PolicyError> {
    attestguard_loader::decode_policy(bytes, origin).map(|_| ())
}

fn decode_group(bytes: &[u8], origin: &str) -> Result<(), attestguard_types::PolicyError> {
    attestguard_loader::decode_group(bytes, origin).map(|_| ())
}

/// Check that every generated schema compiles, and that every fixture document
/// decodes (or is rejected) as expected.
fn conform() -> anyhow::Result<()> {
    let mut errors = Vec::new();

    for spec in schema_specs() {
        let value = serde_json::to_value((spec.generate)())?;
        if let Err(e) = jsonschema::draft202012::new(&value) {
            errors.push(format!("{}: schema does not compile: {e}", spec.filename));
        }
    }

    let kinds: [(&str, Decode); 2] = [("policies", decode_policy), ("groups", decode_group)];

    let mut checked = 0;
    for (subdir, decode) in kinds {
        for path in yaml_files(&fixtures_dir().join(subdir))? {
            let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            let origin = path.display().to_string();
            checked += 1;

            match (decode(&bytes, &origin), expects_rejection(&path)) {
                (Ok(()), false) | (Err(_), true) => println!("✓ {origin}"),
                (Ok(()), true) => errors.push(format!("{origin}: expected rejection")),
                (Err(e), false) => errors.push(format!("{origin}: {e}")),
            }
        }
    }

    if errors.is_empty() {
        println!("\n✓ {checked} fixture documents conform.");
        Ok(())
    } else {
        for error in &errors {
            eprintln!("  - {error}");
        }
        bail!("Conformance failed with {} errors", errors.len())
    }
}

fn print_help() {
    eprintln!("xtask commands:");
    eprintln!("  help              Show this message");
    eprintln!("  emit-schemas      Generate JSON schemas from Rust types to schemas/");
    eprintln!("  validate-schemas  Check if schemas/ matches generated output (for CI)");
    eprintln!("  print-schema-ids  Print known schema IDs");
    eprintln!("  conform           Compile schemas and decode fixture policies and groups");
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cmd = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match cmd {
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        "emit-schemas" => emit_schemas(),
        "validate-schemas" => validate_schemas(),
        "conform" => conform(),
        "print-schema-ids" => {
            for spec in schema_specs() {
                println!("{}", spec.filename.trim_end_matches(".json"));
            }
            Ok(())
        }
        other => bail!("unknown xtask command: {other}\n\nRun `cargo xtask help` for usage."),
    }
    .context("xtask failed")
}
