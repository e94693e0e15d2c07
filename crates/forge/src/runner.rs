//! Running a written project and judging its result record.
//!
//! Generated "then" logic does not assert. It writes a record
//! `{"lookup_key": ..., "actual_value": ...}` which is checked here against
//! the configuration's `expected_outputs`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use stepsmith_core::Backend;

use crate::config::{render_scalar, TestConfig};
use crate::toolchain::run_with_timeout;
use crate::{ForgeError, ResultContractViolation};

static RESULT_RECORD_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "stepsmith result record",
        "type": "object",
        "required": ["lookup_key", "actual_value"],
        "properties": {
            "lookup_key": { "type": "string", "minLength": 1 },
            "actual_value": { "not": { "type": "null" } }
        }
    })
});

const BEHAVE_RUN: &[&str] = &["--no-color"];
const GODOG_RUN: &[&str] = &["test", "./..."];
const CUCUMBER_RUN: &[&str] = &["-B", "clean", "test"];

/// Command that runs the generated tests for `backend`.
pub fn run_command(backend: Backend) -> (&'static str, &'static [&'static str]) {
    match backend {
        Backend::Behave => ("behave", BEHAVE_RUN),
        Backend::Godog => ("go", GODOG_RUN),
        Backend::Cucumber => ("mvn", CUCUMBER_RUN),
    }
}

/// The comparison of one result record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assertion {
    pub lookup_key: String,
    pub expected: String,
    pub actual: String,
}

impl Assertion {
    pub fn passed(&self) -> bool {
        self.expected == self.actual
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The run finished and its record was compared.
    Asserted { assertion: Assertion, output: String },
    /// The run exited non-zero or was killed; no record is read.
    Crashed {
        exit_code: Option<i32>,
        timed_out: bool,
        output: String,
    },
    /// The run finished but its record breaks the contract.
    ContractViolation { violation: String, output: String },
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, RunOutcome::Asserted { assertion, .. } if assertion.passed())
    }
}

/// Execute the project under `root` and judge its result record.
pub fn run_project(
    backend: Backend,
    root: &Path,
    config: &TestConfig,
    timeout: Duration,
) -> Result<RunOutcome, ForgeError> {
    let record = root.join(backend.result_record_path());
    if record.exists() {
        std::fs::remove_file(&record).map_err(|source| ForgeError::Io {
            path: record.clone(),
            source,
        })?;
    }

    let (program, args) = run_command(backend);
    tracing::info!(program, ?args, root = %root.display(), "running generated tests");
    let outcome = run_with_timeout(program, args, root, timeout)?;
    let output = outcome.output();

    if !outcome.success() {
        return Ok(RunOutcome::Crashed {
            exit_code: outcome.exit_code,
            timed_out: outcome.timed_out,
            output,
        });
    }

    Ok(match check_record(&record, config) {
        Ok(assertion) => RunOutcome::Asserted { assertion, output },
        Err(violation) => RunOutcome::ContractViolation {
            violation: violation.to_string(),
            output,
        },
    })
}

/// Read the result record at `path` and compare it with the expected
/// output for its lookup key.
pub fn check_record(path: &Path, config: &TestConfig) -> Result<Assertion, ResultContractViolation> {
    let text = std::fs::read_to_string(path).map_err(|_| ResultContractViolation::MissingRecord {
        path: PathBuf::from(path),
    })?;
    let record: Value = serde_json::from_str(&text).map_err(|e| ResultContractViolation::Malformed {
        path: PathBuf::from(path),
        reason: e.to_string(),
    })?;
    check_value(&record, config)
}

/// Schema-check a parsed record and compare it.
pub fn check_value(record: &Value, config: &TestConfig) -> Result<Assertion, ResultContractViolation> {
    let validator = jsonschema::validator_for(&RESULT_RECORD_SCHEMA)
        .map_err(|e| ResultContractViolation::Schema(vec![format!("internal schema error: {}", e)]))?;
    let errors: Vec<String> = validator.iter_errors(record).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(ResultContractViolation::Schema(errors));
    }

    let lookup_key = record["lookup_key"].as_str().unwrap_or_default().to_string();
    let actual = render_scalar(&record["actual_value"]);
    let expected = config
        .expected(&lookup_key)
        .ok_or_else(|| ResultContractViolation::UnknownKey {
            key: lookup_key.clone(),
        })?;

    Ok(Assertion {
        lookup_key,
        expected,
        actual,
    })
}
