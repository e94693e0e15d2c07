//! End-to-end pipeline tests with fixed-string oracles and scripted
//! validators. No network, no toolchains.

use std::collections::BTreeMap;

use stepsmith_codegen::AssembledUnit;
use stepsmith_core::Backend;
use stepsmith_forge::{
    write_outputs, Forge, ForgeSettings, ProjectSource, RepairState, TestConfig, ValidationVerdict,
    Validator, VerdictStatus, REPORT_FILE,
};
use stepsmith_synth::{OracleError, RepairRequest, SynthesisBundle, SynthesisOracle};

const CALCULATOR: &str = "\
Feature: Calculator

  Scenario: Add two numbers
    Given a value of \"5\"
    When we add \"3\"
    Then the result should be \"8\"
";

/// Answers from a table keyed by step text; unknown steps fail.
#[derive(Default)]
struct TableOracle {
    answers: BTreeMap<String, String>,
    bundles: Vec<SynthesisBundle>,
    repairs: Vec<RepairRequest>,
}

impl TableOracle {
    fn with(mut self, step: &str, answer: &str) -> Self {
        self.answers.insert(step.to_string(), answer.to_string());
        self
    }

    fn calls_for(&self, step: &str) -> usize {
        self.bundles.iter().filter(|b| b.step_text == step).count()
    }
}

impl SynthesisOracle for TableOracle {
    fn synthesize(&mut self, bundle: &SynthesisBundle) -> Result<String, OracleError> {
        self.bundles.push(bundle.clone());
        self.answers
            .get(&bundle.step_text)
            .cloned()
            .ok_or(OracleError::Status { status: 503 })
    }

    fn repair(&mut self, request: &RepairRequest) -> Result<String, OracleError> {
        self.repairs.push(request.clone());
        Ok(format!("```\n{}\n```", request.source))
    }
}

struct Always(VerdictStatus);

impl Validator for Always {
    fn validate(&mut self, _unit: &AssembledUnit, attempt: u32) -> ValidationVerdict {
        ValidationVerdict {
            status: self.0,
            diagnostic: format!("scripted {:?}", self.0),
            attempt,
        }
    }
}

fn calculator_oracle() -> TableOracle {
    TableOracle::default()
        .with(
            "Given a value of \"5\"",
            "---IMPORTS---\n---CONTEXT-FIELDS---\n---LOGIC---\ncontext.total = int(of)",
        )
        .with(
            "When we add \"3\"",
            "```python\ncontext.total += int(add)\n```",
        )
        .with(
            "Then the result should be \"8\"",
            "---IMPORTS---\nimport json\nimport os\n---CONTEXT-FIELDS---\n---LOGIC---\n\
             with open('test_result.json', 'w') as f:\n    json.dump({'lookup_key': 'sum', 'actual_value': str(context.total)}, f)",
        )
}

#[test]
fn calculator_generates_and_is_accepted() {
    let mut forge = Forge::new(
        calculator_oracle(),
        Always(VerdictStatus::Clean),
        ForgeSettings::new(Backend::Behave),
    );
    let outcome = forge.generate(CALCULATOR, &serde_json::json!({})).expect("generate");

    assert!(outcome.succeeded());
    assert_eq!(outcome.repair.repairs, 0);
    assert_eq!(outcome.steps.metadata.len(), 3);
    assert!(outcome.steps.skipped.is_empty());

    let src = &outcome.repair.unit.primary().contents;
    assert!(src.contains("context.total = int(of)"));
    assert!(src.contains("context.total += int(add)"));
    assert!(src.contains("import json"));
    assert!(!src.contains("import os"), "unused import survives:\n{}", src);
}

#[test]
fn later_steps_see_state_from_earlier_steps() {
    let mut forge = Forge::new(
        calculator_oracle(),
        Always(VerdictStatus::Clean),
        ForgeSettings::new(Backend::Behave),
    );
    forge.generate(CALCULATOR, &serde_json::json!({})).expect("generate");

    let bundles = &forge.oracle().bundles;
    assert!(bundles[0].known_fields.is_empty());
    assert_eq!(
        bundles[1].known_fields,
        vec!["context.total (set by step: Given a value of \"5\")".to_string()]
    );
    assert!(bundles[1].scenario_text.contains("Scenario: Add two numbers"));
    assert!(bundles[1].feature_text.starts_with("Feature: Calculator"));
}

#[test]
fn repeated_step_is_synthesized_once() {
    let text = "\
Feature: Service
  Scenario: first
    Given the service is running
  Scenario: second
    Given the service is running
";
    let oracle = TableOracle::default().with("Given the service is running", "s.running = true");
    let mut forge = Forge::new(oracle, Always(VerdictStatus::Clean), ForgeSettings::new(Backend::Godog));
    let outcome = forge.generate(text, &serde_json::json!({})).expect("generate");

    assert_eq!(forge.oracle().calls_for("Given the service is running"), 1);
    assert_eq!(outcome.steps.records.len(), 2);
    assert!(outcome.steps.records[1].reused);
    let src = &outcome.repair.unit.primary().contents;
    let id = outcome.steps.records[0].identifier.as_str();
    assert_eq!(src.matches(&format!("func (s *scenarioContext) {}(", id)).count(), 1);
}

#[test]
fn failed_step_is_skipped_and_siblings_survive() {
    let oracle = calculator_oracle();
    let mut oracle = oracle;
    oracle.answers.remove("When we add \"3\"");
    let mut forge = Forge::new(oracle, Always(VerdictStatus::Clean), ForgeSettings::new(Backend::Behave));
    let outcome = forge.generate(CALCULATOR, &serde_json::json!({})).expect("generate");

    assert_eq!(outcome.steps.skipped.len(), 1);
    assert_eq!(outcome.steps.skipped[0].step, "When we add \"3\"");
    assert!(outcome.steps.skipped[0].error.contains("503"));
    assert_eq!(outcome.steps.metadata.len(), 2);
    assert!(outcome.succeeded());
}

#[test]
fn empty_answer_gets_one_retry_with_a_diagnostic_then_the_placeholder() {
    let oracle = TableOracle::default().with("Given nothing useful", "Sure! Here is the code:");
    let mut forge = Forge::new(oracle, Always(VerdictStatus::Clean), ForgeSettings::new(Backend::Cucumber));
    let text = "Feature: F\n  Scenario: S\n    Given nothing useful\n";
    let outcome = forge.generate(text, &serde_json::json!({})).expect("generate");

    let bundles = &forge.oracle().bundles;
    assert_eq!(bundles.len(), 2);
    assert!(bundles[0].prior_diagnostic.is_none());
    assert!(bundles[1].prior_diagnostic.is_some());
    assert!(outcome.steps.records[0].placeholder);
    assert!(outcome
        .repair
        .unit
        .primary()
        .contents
        .contains(Backend::Cucumber.placeholder_body()));
}

/// Serves scripted answers in order; repairs echo the source.
struct Sequence(Vec<Result<String, OracleError>>);

impl SynthesisOracle for Sequence {
    fn synthesize(&mut self, _bundle: &SynthesisBundle) -> Result<String, OracleError> {
        if self.0.is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        self.0.remove(0)
    }

    fn repair(&mut self, request: &RepairRequest) -> Result<String, OracleError> {
        Ok(request.source.clone())
    }
}

#[test]
fn failed_retry_keeps_the_placeholder() {
    let oracle = Sequence(vec![
        Ok("Sure! Here is the code:".to_string()),
        Err(OracleError::Status { status: 503 }),
    ]);
    let mut forge = Forge::new(oracle, Always(VerdictStatus::Clean), ForgeSettings::new(Backend::Behave));
    let text = "Feature: F\n  Scenario: S\n    Given nothing useful\n";
    let outcome = forge.generate(text, &serde_json::json!({})).expect("generate");

    assert!(outcome.steps.skipped.is_empty());
    assert_eq!(outcome.steps.metadata.len(), 1);
    assert!(outcome.steps.records[0].placeholder);
    assert!(outcome
        .repair
        .unit
        .primary()
        .contents
        .contains(Backend::Behave.placeholder_body()));
}

#[test]
fn rejected_unit_is_kept_and_written() {
    let mut forge = Forge::new(
        calculator_oracle(),
        Always(VerdictStatus::StructuralFailure),
        ForgeSettings::new(Backend::Behave).with_max_repairs(2),
    );
    let outcome = forge.generate(CALCULATOR, &serde_json::json!({})).expect("generate");

    assert_eq!(outcome.repair.state, RepairState::Rejected);
    assert_eq!(outcome.repair.repairs, 2);
    assert_eq!(outcome.repair.validations, 3);
    assert_eq!(forge.oracle().repairs.len(), 2);
    assert_eq!(forge.oracle().repairs[1].attempt, 2);
    assert_eq!(forge.oracle().repairs[0].diagnostic, "scripted StructuralFailure");

    let dir = tempfile::tempdir().expect("temp dir");
    let source = ProjectSource {
        feature_name: "calculator.feature".into(),
        feature_text: CALCULATOR.into(),
        config: TestConfig::empty(),
    };
    let written = write_outputs(&outcome, &source, dir.path()).expect("write");
    assert!(written.project_dir.join("features/steps/step_definitions.py").is_file());
    assert!(dir.path().join("features/calculator.feature").is_file());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(REPORT_FILE)).expect("report"))
            .expect("report is json");
    assert_eq!(report["state"], "rejected");
    assert_eq!(report["backend"], "behave");
    assert_eq!(report["repairs"], 2);
    assert_eq!(report["steps"].as_array().map(Vec::len), Some(3));
    assert_eq!(report["verdict"]["status"], "structural_failure");
    assert!(report["generated_at"].as_str().is_some_and(|t| t.contains('T')));
}
