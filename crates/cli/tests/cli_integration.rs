//! CLI integration tests for the `stepsmith` binary.
//!
//! Every test runs offline: generation uses `--dry-run` or `--replay` and
//! `--no-validate`, so neither a model endpoint nor a backend toolchain is
//! needed.

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;

const CALCULATOR: &str = "\
Feature: Calculator

  Scenario: Add two numbers
    Given a value of \"5\"
    When we add \"3\"
    Then the result should be \"8\"
";

const CONFIG: &str = "expected_outputs:\n  sum: \"8\"\n";

fn stepsmith(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("stepsmith");
    cmd.current_dir(dir);
    cmd.env_remove("RUST_LOG");
    cmd
}

/// A temp dir holding `calculator.feature` and `config.yaml`.
fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(dir.path().join("calculator.feature"), CALCULATOR).expect("write feature");
    std::fs::write(dir.path().join("config.yaml"), CONFIG).expect("write config");
    dir
}

fn read_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path).expect("read json");
    serde_json::from_str(&text).expect("valid json")
}

// ──────────────────────────────────────────────
// Help and version
// ──────────────────────────────────────────────

#[test]
fn help_lists_subcommands() {
    let dir = workspace();
    stepsmith(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("parse"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn version_flag() {
    let dir = workspace();
    stepsmith(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stepsmith"));
}

// ──────────────────────────────────────────────
// parse
// ──────────────────────────────────────────────

#[test]
fn parse_shows_roles_and_patterns() {
    let dir = workspace();
    stepsmith(dir.path())
        .args(["parse", "calculator.feature", "--backend", "behave"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scenario: Add two numbers"))
        .stdout(predicate::str::contains("[Then] Then the result should be \"8\""))
        .stdout(predicate::str::contains("identifier:"));
}

#[test]
fn parse_json_lists_every_step() {
    let dir = workspace();
    let out = stepsmith(dir.path())
        .args(["--output", "json", "parse", "calculator.feature", "--backend", "godog"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).expect("json output");
    assert_eq!(value["feature"], "Calculator");
    assert_eq!(value["backend"], "godog");
    assert_eq!(value["steps"], 3);
    let steps = value["scenarios"][0]["steps"].as_array().expect("steps");
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[1]["role"], "when");
}

#[test]
fn parse_rejects_unknown_backend() {
    let dir = workspace();
    stepsmith(dir.path())
        .args(["parse", "calculator.feature", "--backend", "rspec"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported backend"));
}

#[test]
fn parse_missing_file_fails() {
    let dir = workspace();
    stepsmith(dir.path())
        .args(["parse", "missing.feature", "--backend", "behave"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error reading file"));
}

#[test]
fn parse_json_errors_are_json() {
    let dir = workspace();
    stepsmith(dir.path())
        .args(["--output", "json", "parse", "missing.feature", "--backend", "behave"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("{\"error\":"));
}

#[test]
fn json_errors_escape_backslashes() {
    let dir = workspace();
    let out = stepsmith(dir.path())
        .args(["--output", "json", "parse", r"no\such.feature", "--backend", "behave"])
        .assert()
        .failure()
        .get_output()
        .clone();
    let stderr = String::from_utf8(out.stderr).unwrap();
    let line = stderr.lines().rfind(|l| !l.trim().is_empty()).unwrap();
    let value: serde_json::Value = serde_json::from_str(line).unwrap();
    assert!(value["error"].as_str().unwrap().contains(r"no\such.feature"));
}

// ──────────────────────────────────────────────
// generate
// ──────────────────────────────────────────────

#[test]
fn dry_run_writes_project_and_report() {
    let dir = workspace();
    stepsmith(dir.path())
        .args([
            "generate",
            "calculator.feature",
            "--config",
            "config.yaml",
            "--backend",
            "behave",
            "--out",
            "out",
            "--dry-run",
            "--no-validate",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 placeholder"))
        .stdout(predicate::str::contains("unverified"));

    let out = dir.path().join("out");
    let steps = out.join("behave/features/steps/step_definitions.py");
    assert!(steps.is_file());
    let source = std::fs::read_to_string(&steps).expect("read steps");
    assert!(source.contains("@given"));
    assert!(out.join("features/calculator.feature").is_file());

    let report = read_json(&out.join("stepsmith-report.json"));
    assert_eq!(report["state"], "accepted");
    assert_eq!(report["unverified"], true);
    assert_eq!(report["backend"], "behave");
    assert_eq!(report["steps"].as_array().map(Vec::len), Some(3));
}

#[test]
fn dry_run_json_summary() {
    let dir = workspace();
    let out = stepsmith(dir.path())
        .args([
            "--output",
            "json",
            "generate",
            "calculator.feature",
            "--config",
            "config.yaml",
            "--backend",
            "cucumber",
            "--out",
            "out",
            "--dry-run",
            "--no-validate",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).expect("json output");
    assert_eq!(value["backend"], "cucumber");
    assert_eq!(value["state"], "accepted");
    assert_eq!(value["placeholders"], 3);
    assert_eq!(value["repairs"], 0);
    assert!(value["files"].as_array().is_some_and(|f| !f.is_empty()));
}

#[test]
fn replay_uses_recorded_answers() {
    let dir = workspace();
    let recording = serde_json::json!({
        "steps": {
            "Given a value of \"5\"": "---IMPORTS---\n---CONTEXT-FIELDS---\n---LOGIC---\ncontext.total = int(of)",
            "When we add \"3\"": "context.total += int(add)",
            "Then the result should be \"8\"": "---IMPORTS---\nimport json\n---CONTEXT-FIELDS---\n---LOGIC---\nwith open('test_result.json', 'w') as f:\n    json.dump({'lookup_key': 'sum', 'actual_value': str(context.total)}, f)"
        }
    });
    std::fs::write(
        dir.path().join("answers.json"),
        serde_json::to_string_pretty(&recording).expect("serialize"),
    )
    .expect("write recording");

    stepsmith(dir.path())
        .args([
            "generate",
            "calculator.feature",
            "--config",
            "config.yaml",
            "--backend",
            "behave",
            "--out",
            "out",
            "--replay",
            "answers.json",
            "--no-validate",
        ])
        .assert()
        .success();

    let source = std::fs::read_to_string(
        dir.path().join("out/behave/features/steps/step_definitions.py"),
    )
    .expect("read steps");
    assert!(source.contains("context.total = int(of)"));
    assert!(source.contains("context.total += int(add)"));
    assert!(source.contains("import json"));
}

#[test]
fn dry_run_can_be_recorded() {
    let dir = workspace();
    stepsmith(dir.path())
        .args([
            "generate",
            "calculator.feature",
            "--config",
            "config.yaml",
            "--backend",
            "godog",
            "--out",
            "out",
            "--dry-run",
            "--no-validate",
            "--record",
            "answers.json",
        ])
        .assert()
        .success();

    let recording = read_json(&dir.path().join("answers.json"));
    let steps = recording["steps"].as_object().expect("steps map");
    assert_eq!(steps.len(), 3);
    assert!(steps.contains_key("When we add \"3\""));
}

#[test]
fn generate_missing_config_fails() {
    let dir = workspace();
    stepsmith(dir.path())
        .args([
            "generate",
            "calculator.feature",
            "--config",
            "nope.yaml",
            "--backend",
            "behave",
            "--dry-run",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.yaml"));
}

#[test]
fn generate_without_api_key_fails() {
    let dir = workspace();
    stepsmith(dir.path())
        .env_remove("STEPSMITH_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .args([
            "generate",
            "calculator.feature",
            "--config",
            "config.yaml",
            "--backend",
            "behave",
            "--no-validate",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("oracle setup failed"));
}

#[test]
fn replay_conflicts_with_dry_run() {
    let dir = workspace();
    stepsmith(dir.path())
        .args([
            "generate",
            "calculator.feature",
            "--config",
            "config.yaml",
            "--backend",
            "behave",
            "--dry-run",
            "--replay",
            "answers.json",
        ])
        .assert()
        .failure();
}

// ──────────────────────────────────────────────
// validate and run
// ──────────────────────────────────────────────

#[test]
fn validate_missing_project_fails() {
    let dir = workspace();
    stepsmith(dir.path())
        .args(["validate", "out/behave", "--backend", "behave"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn run_missing_project_fails() {
    let dir = workspace();
    stepsmith(dir.path())
        .args([
            "run",
            "out/behave",
            "--backend",
            "behave",
            "--config",
            "config.yaml",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
