//! Structural validation of assembled units with the backend toolchains.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use stepsmith_codegen::{write_project, AssembledUnit, ProjectInputs};
use stepsmith_core::Backend;

use crate::config::TestConfig;
use crate::toolchain::{run_with_timeout, ProcessOutcome, DEFAULT_TIMEOUT};
use crate::ToolchainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Parses, lints and builds (or, for interpreted backends, ran to
    /// completion with at most logical assertion failures).
    Clean,
    StructuralFailure,
    /// The check could not be carried out, e.g. the toolchain is missing.
    Inconclusive,
}

impl VerdictStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerdictStatus::Clean => "clean",
            VerdictStatus::StructuralFailure => "structural_failure",
            VerdictStatus::Inconclusive => "inconclusive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub status: VerdictStatus,
    pub diagnostic: String,
    /// 0 for the first validation, n after the n-th repair.
    pub attempt: u32,
}

impl ValidationVerdict {
    pub fn clean(attempt: u32, diagnostic: impl Into<String>) -> Self {
        ValidationVerdict {
            status: VerdictStatus::Clean,
            diagnostic: diagnostic.into(),
            attempt,
        }
    }

    pub fn failure(attempt: u32, diagnostic: impl Into<String>) -> Self {
        ValidationVerdict {
            status: VerdictStatus::StructuralFailure,
            diagnostic: diagnostic.into(),
            attempt,
        }
    }

    pub fn inconclusive(attempt: u32, diagnostic: impl Into<String>) -> Self {
        ValidationVerdict {
            status: VerdictStatus::Inconclusive,
            diagnostic: diagnostic.into(),
            attempt,
        }
    }
}

/// Judges whether an assembled unit is structurally sound.
pub trait Validator {
    fn validate(&mut self, unit: &AssembledUnit, attempt: u32) -> ValidationVerdict;
}

impl<T: Validator + ?Sized> Validator for Box<T> {
    fn validate(&mut self, unit: &AssembledUnit, attempt: u32) -> ValidationVerdict {
        (**self).validate(unit, attempt)
    }
}

/// Feature and configuration a unit is validated and run with.
#[derive(Debug, Clone)]
pub struct ProjectSource {
    pub feature_name: String,
    pub feature_text: String,
    pub config: TestConfig,
}

impl ProjectSource {
    pub fn inputs(&self) -> ProjectInputs<'_> {
        ProjectInputs {
            feature_name: &self.feature_name,
            feature_text: &self.feature_text,
            config: &self.config.value,
            config_source: Some(self.config.source_file()),
        }
    }
}

// ── Stages ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageKind {
    /// Exit 0 passes; anything else is a structural failure.
    Check,
    /// A Behave run judged by [`classify_behave_run`].
    BehaveRun,
}

#[derive(Debug, Clone, Copy)]
struct Stage {
    name: &'static str,
    program: &'static str,
    args: &'static [&'static str],
    kind: StageKind,
}

const BEHAVE_STAGES: &[Stage] = &[
    Stage {
        name: "syntax",
        program: "python3",
        args: &["-m", "py_compile", "features/steps/step_definitions.py"],
        kind: StageKind::Check,
    },
    Stage {
        name: "run",
        program: "behave",
        args: &["--no-color", "features"],
        kind: StageKind::BehaveRun,
    },
];

const GODOG_STAGES: &[Stage] = &[
    Stage {
        name: "syntax",
        program: "gofmt",
        args: &["-e", "-l", "."],
        kind: StageKind::Check,
    },
    Stage {
        name: "dependencies",
        program: "go",
        args: &["mod", "tidy"],
        kind: StageKind::Check,
    },
    Stage {
        name: "lint",
        program: "go",
        args: &["vet", "."],
        kind: StageKind::Check,
    },
    Stage {
        name: "build",
        program: "go",
        args: &["test", "-count=1", "-run", "^$", "."],
        kind: StageKind::Check,
    },
];

const CUCUMBER_STAGES: &[Stage] = &[Stage {
    name: "build",
    program: "mvn",
    args: &["-q", "-B", "test-compile"],
    kind: StageKind::Check,
}];

fn stages(backend: Backend) -> &'static [Stage] {
    match backend {
        Backend::Behave => BEHAVE_STAGES,
        Backend::Godog => GODOG_STAGES,
        Backend::Cucumber => CUCUMBER_STAGES,
    }
}

/// Names of the validation stages for `backend`, in order.
pub fn stage_names(backend: Backend) -> Vec<&'static str> {
    stages(backend).iter().map(|s| s.name).collect()
}

// ── Toolchain validator ──────────────────────────────────────────────────────

/// Materializes each unit into a fresh temporary project and runs the
/// backend's stages, stopping at the first failure.
#[derive(Debug, Clone)]
pub struct ToolchainValidator {
    source: ProjectSource,
    timeout: Duration,
}

impl ToolchainValidator {
    pub fn new(source: ProjectSource) -> Self {
        ToolchainValidator {
            source,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the stages against an already written project directory.
    pub fn validate_dir(&self, backend: Backend, root: &Path, attempt: u32) -> ValidationVerdict {
        for stage in stages(backend) {
            let command = format!("{} {}", stage.program, stage.args.join(" "));
            tracing::info!(stage = stage.name, %command, attempt, "validating");
            let outcome = match run_with_timeout(stage.program, stage.args, root, self.timeout) {
                Ok(outcome) => outcome,
                Err(ToolchainError::NotFound { program }) => {
                    return ValidationVerdict::inconclusive(
                        attempt,
                        format!("cannot run stage `{}`: `{}` is not installed", stage.name, program),
                    );
                }
                Err(e) => {
                    return ValidationVerdict::inconclusive(
                        attempt,
                        format!("cannot run stage `{}`: {}", stage.name, e),
                    );
                }
            };
            if outcome.timed_out {
                return ValidationVerdict::failure(
                    attempt,
                    format!(
                        "stage `{}` ({}) timed out after {}s\n{}",
                        stage.name,
                        command,
                        self.timeout.as_secs(),
                        outcome.output()
                    ),
                );
            }
            let status = match stage.kind {
                StageKind::Check if outcome.success() => VerdictStatus::Clean,
                StageKind::Check => VerdictStatus::StructuralFailure,
                StageKind::BehaveRun => classify_behave_run(&outcome),
            };
            if status != VerdictStatus::Clean {
                return ValidationVerdict::failure(attempt, stage_failure(stage, &command, &outcome));
            }
        }
        ValidationVerdict::clean(attempt, format!("all {} stages passed", stages(backend).len()))
    }
}

impl Validator for ToolchainValidator {
    fn validate(&mut self, unit: &AssembledUnit, attempt: u32) -> ValidationVerdict {
        let dir = match tempfile::Builder::new().prefix("stepsmith-validate-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return ValidationVerdict::inconclusive(attempt, format!("cannot create temp dir: {}", e))
            }
        };
        if let Err(e) = write_project(unit, &self.source.inputs(), dir.path()) {
            return ValidationVerdict::inconclusive(attempt, format!("cannot materialize project: {}", e));
        }
        self.validate_dir(unit.backend, dir.path(), attempt)
    }
}

fn stage_failure(stage: &Stage, command: &str, outcome: &ProcessOutcome) -> String {
    let code = outcome
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    format!(
        "stage `{}` ({}) failed with exit code {}\n{}",
        stage.name,
        command,
        code,
        outcome.output()
    )
}

// ── Behave run classification ────────────────────────────────────────────────

static BEHAVE_STEP_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\d+ steps? passed, \d+ failed, .*?(\d+) undefined").expect("behave summary regex")
});

/// An exception line of a traceback: the (possibly dotted) exception name
/// at the start of a line, followed by `:` or nothing. Echoed step text
/// that merely mentions an exception name does not match.
static EXCEPTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:[A-Za-z_]\w*\.)*([A-Z]\w*(?:Error|Exception))(?::|[ \t]*$)")
        .expect("exception name regex")
});

/// Decide whether a completed Behave run means the code is structurally
/// sound. A run that only failed on assertions is clean; a crash, an
/// undefined step or a missing summary is not.
pub fn classify_behave_run(outcome: &ProcessOutcome) -> VerdictStatus {
    if outcome.success() {
        return VerdictStatus::Clean;
    }
    let output = outcome.output();
    let undefined = match BEHAVE_STEP_SUMMARY.captures(&output) {
        Some(caps) => caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()).unwrap_or(0),
        None => return VerdictStatus::StructuralFailure,
    };
    if undefined > 0 {
        return VerdictStatus::StructuralFailure;
    }
    let mut saw_assertion = false;
    for caps in EXCEPTION_NAME.captures_iter(&output) {
        match &caps[1] {
            "AssertionError" => saw_assertion = true,
            _ => return VerdictStatus::StructuralFailure,
        }
    }
    if saw_assertion {
        VerdictStatus::Clean
    } else {
        VerdictStatus::StructuralFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn behave(exit: i32, stdout: &str) -> ProcessOutcome {
        ProcessOutcome {
            exit_code: Some(exit),
            timed_out: false,
            elapsed_ms: 10,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[test]
    fn assertion_only_failure_is_clean() {
        let out = behave(
            1,
            "Assertion Failed: expected 8\nTraceback (most recent call last):\n  AssertionError: 7 != 8\n\
             0 features passed, 1 failed, 0 skipped\n\
             2 steps passed, 1 failed, 0 skipped, 0 undefined\n",
        );
        assert_eq!(classify_behave_run(&out), VerdictStatus::Clean);
    }

    #[test]
    fn exception_names_in_step_text_are_not_crashes() {
        let out = behave(
            1,
            "  Then an InvalidInputError is shown # features/steps/step_definitions.py:12
             Traceback (most recent call last):
  AssertionError: expected InvalidInputError
             1 step passed, 1 failed, 0 skipped, 0 undefined
",
        );
        assert_eq!(classify_behave_run(&out), VerdictStatus::Clean);
    }

    #[test]
    fn dotted_exception_is_structural() {
        let out = behave(
            1,
            "requests.exceptions.ConnectionError: refused
             0 steps passed, 1 failed, 0 skipped, 0 undefined
",
        );
        assert_eq!(classify_behave_run(&out), VerdictStatus::StructuralFailure);
    }

    #[test]
    fn crash_is_structural() {
        let out = behave(
            1,
            "Traceback (most recent call last):\nNameError: name 'subprocess' is not defined\n\
             2 steps passed, 0 failed, 1 skipped, 0 undefined\n",
        );
        assert_eq!(classify_behave_run(&out), VerdictStatus::StructuralFailure);
    }

    #[test]
    fn undefined_steps_are_structural() {
        let out = behave(1, "2 steps passed, 0 failed, 0 skipped, 1 undefined\n");
        assert_eq!(classify_behave_run(&out), VerdictStatus::StructuralFailure);
    }

    #[test]
    fn missing_summary_is_structural() {
        let out = behave(2, "ConfigError: No steps directory\n");
        assert_eq!(classify_behave_run(&out), VerdictStatus::StructuralFailure);
    }

    #[test]
    fn clean_exit_is_clean() {
        assert_eq!(classify_behave_run(&behave(0, "")), VerdictStatus::Clean);
    }

    #[test]
    fn stage_order_per_backend() {
        assert_eq!(stage_names(Backend::Behave), vec!["syntax", "run"]);
        assert_eq!(stage_names(Backend::Godog), vec!["syntax", "dependencies", "lint", "build"]);
        assert_eq!(stage_names(Backend::Cucumber), vec!["build"]);
    }
}
