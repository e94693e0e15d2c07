use std::path::Path;
use std::process;
use std::time::Duration;

use serde_json::json;
use stepsmith_core::Backend;
use stepsmith_forge::{ProjectSource, TestConfig, ToolchainValidator, VerdictStatus};

use crate::{fail, print_json, OutputFormat};

pub(crate) fn cmd_validate(
    project: &Path,
    backend: Backend,
    timeout_secs: u64,
    output: OutputFormat,
    quiet: bool,
) {
    if !project.is_dir() {
        let msg = format!("project directory '{}' does not exist", project.display());
        fail(&msg, output, quiet);
    }

    // Only the stages run here; the project on disk already holds its
    // feature and configuration.
    let source = ProjectSource {
        feature_name: String::new(),
        feature_text: String::new(),
        config: TestConfig::empty(),
    };
    let validator =
        ToolchainValidator::new(source).with_timeout(Duration::from_secs(timeout_secs));
    let verdict = validator.validate_dir(backend, project, 0);

    match output {
        OutputFormat::Json => print_json(&json!({
            "project_dir": project.display().to_string(),
            "backend": backend.name(),
            "status": verdict.status.as_str(),
            "diagnostic": verdict.diagnostic,
        })),
        OutputFormat::Text => {
            if !quiet {
                println!("{}: {}", project.display(), verdict.status.as_str());
                if verdict.status != VerdictStatus::Clean {
                    println!("{}", verdict.diagnostic);
                }
            }
        }
    }

    // Inconclusive means the toolchain was unavailable, not that the
    // project is broken.
    if verdict.status == VerdictStatus::StructuralFailure {
        process::exit(1);
    }
}
