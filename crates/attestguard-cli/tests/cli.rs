//! End-to-end CLI tests against the shared fixtures in `tests/fixtures/`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(deprecated)]
fn attestguard_cmd() -> Command {
    let mut cmd = Command::cargo_bin("attestguard")
        .expect("attestguard binary not found - run `cargo build` first");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("attestguard-cli crate should have a parent directory")
        .parent()
        .expect("crates directory should have a parent (repo root)")
        .join("tests")
        .join("fixtures")
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn write_report(dir: &TempDir, body: &Value) -> PathBuf {
    let path = dir.path().join("report.json");
    std::fs::write(&path, serde_json::to_vec(body).expect("serialize")).expect("write report");
    path
}

fn violated_statement() -> Value {
    json!({
        "_type": "https://in-toto.io/Statement/v1",
        "predicateType": "chainloop.dev/attestation/v0.2",
        "predicate": {
            "policyEvaluations": {
                "sbom": [{
                    "name": "sbom-present",
                    "materialName": "sbom",
                    "violations": [{ "subject": "sbom-present", "message": "no components" }]
                }],
                "CHAINLOOP_ATTESTATION": [{ "name": "signed-off" }]
            }
        }
    })
}

#[test]
fn help_works() {
    attestguard_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn resolve_prints_policy_with_provenance() {
    let fixtures = fixtures_dir();
    let output = attestguard_cmd()
        .current_dir(&fixtures)
        .args(["resolve", "file://policies/sbom-present.yaml"])
        .output()
        .expect("run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let value = stdout_json(&output);
    assert_eq!(value["reference"]["name"], "sbom-present");
    assert!(
        value["reference"]["digest"]
            .as_str()
            .is_some_and(|d| d.starts_with("sha256:"))
    );
    assert_eq!(value["sources"].as_array().map(Vec::len), Some(1));
    assert_eq!(value["sources"][0]["kind"], "rego");
}

#[test]
fn resolve_group_with_base_dir() {
    let fixtures = fixtures_dir();
    let output = attestguard_cmd()
        .args(["resolve", "--group", "file://groups/sbom-quality.yaml", "--base-dir"])
        .arg(&fixtures)
        .output()
        .expect("run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let value = stdout_json(&output);
    assert_eq!(value["reference"]["name"], "sbom-quality");
    assert_eq!(value["group"]["kind"], "PolicyGroup");
}

#[test]
fn resolve_rejects_bad_digest() {
    attestguard_cmd()
        .current_dir(fixtures_dir())
        .args(["resolve", "file://policies/sbom-present.yaml@sha256:deadbeef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sha256"));
}

#[test]
fn lint_reports_bindings_and_unknown_skips() {
    let fixtures = fixtures_dir();
    let output = attestguard_cmd()
        .args(["lint", "file://groups/sbom-quality.yaml"])
        .args(["--with", "approver=alice", "--skip", "ghost"])
        .arg("--base-dir")
        .arg(&fixtures)
        .output()
        .expect("run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let value = stdout_json(&output);
    assert_eq!(value["bindings"]["approver"], "alice");
    assert_eq!(value["unknownSkips"], json!(["ghost"]));
    assert_eq!(value["policies"], json!(["sbom-present", "signed-off"]));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ghost"));
}

#[test]
fn lint_fails_on_missing_required_input() {
    attestguard_cmd()
        .args(["lint", "file://groups/required-input.yaml", "--base-dir"])
        .arg(fixtures_dir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("user_name"));
}

#[test]
fn lint_rejects_malformed_with() {
    attestguard_cmd()
        .args(["lint", "file://groups/sbom-quality.yaml", "--with", "approver"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn gate_advisory_warns_but_passes() {
    let tmp = TempDir::new().expect("temp dir");
    let report = write_report(&tmp, &violated_statement());

    let output = attestguard_cmd()
        .current_dir(tmp.path())
        .arg("gate")
        .arg("--report")
        .arg(&report)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(0));

    let value = stdout_json(&output);
    assert_eq!(value["verdict"], "warn");
    assert_eq!(value["evaluated"], 2);
    assert_eq!(value["violated"], json!(["sbom-present"]));
}

#[test]
fn gate_enforced_exits_two() {
    let tmp = TempDir::new().expect("temp dir");
    let report = write_report(&tmp, &violated_statement());

    let output = attestguard_cmd()
        .current_dir(tmp.path())
        .args(["--gate", "enforced", "gate", "--report"])
        .arg(&report)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stdout_json(&output)["verdict"], "fail");
}

#[test]
fn gate_reads_config_gate_mode() {
    let tmp = TempDir::new().expect("temp dir");
    std::fs::write(
        tmp.path().join("attestguard.toml"),
        "schema = \"attestguard.config.v1\"\ngate = \"enforced\"\n",
    )
    .expect("write config");
    let report = write_report(&tmp, &violated_statement());

    attestguard_cmd()
        .current_dir(tmp.path())
        .args(["gate", "--report"])
        .arg(&report)
        .assert()
        .code(2);
}

#[test]
fn gate_accepts_evaluation_list() {
    let tmp = TempDir::new().expect("temp dir");
    let report = write_report(
        &tmp,
        &json!([
            { "name": "sbom-present", "skipped": true },
            { "name": "signed-off" }
        ]),
    );

    let output = attestguard_cmd()
        .current_dir(tmp.path())
        .args(["--gate", "enforced", "gate", "--report"])
        .arg(&report)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(0));

    let value = stdout_json(&output);
    assert_eq!(value["verdict"], "pass");
    assert_eq!(value["skipped"], 1);
}

#[test]
fn gate_rejects_unknown_predicate_type() {
    let tmp = TempDir::new().expect("temp dir");
    let report = write_report(
        &tmp,
        &json!({ "predicateType": "example.com/other/v1", "predicate": {} }),
    );

    attestguard_cmd()
        .current_dir(tmp.path())
        .args(["gate", "--report"])
        .arg(&report)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported predicate type"));
}

#[test]
fn invalid_config_is_an_error() {
    let tmp = TempDir::new().expect("temp dir");
    std::fs::write(tmp.path().join("attestguard.toml"), "phase = \"later\"\n").expect("write");
    let report = write_report(&tmp, &json!([]));

    attestguard_cmd()
        .current_dir(tmp.path())
        .args(["gate", "--report"])
        .arg(&report)
        .assert()
        .failure();
}
