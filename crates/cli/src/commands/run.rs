use std::path::Path;
use std::process;
use std::time::Duration;

use serde_json::json;
use stepsmith_core::Backend;
use stepsmith_forge::{run_project, RunOutcome, TestConfig};

use crate::{fail, print_json, OutputFormat};

pub(crate) fn cmd_run(
    project: &Path,
    backend: Backend,
    config_path: &Path,
    timeout_secs: u64,
    output: OutputFormat,
    quiet: bool,
) {
    if !project.is_dir() {
        let msg = format!("project directory '{}' does not exist", project.display());
        fail(&msg, output, quiet);
    }
    let config = match TestConfig::load(config_path) {
        Ok(c) => c,
        Err(e) => fail(&format!("{}: {}", config_path.display(), e), output, quiet),
    };

    let outcome = match run_project(backend, project, &config, Duration::from_secs(timeout_secs)) {
        Ok(o) => o,
        Err(e) => fail(&e.to_string(), output, quiet),
    };

    match output {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&outcome).unwrap_or_default();
            if let Some(map) = value.as_object_mut() {
                map.insert("passed".into(), json!(outcome.passed()));
                map.insert("backend".into(), json!(backend.name()));
            }
            print_json(&value);
        }
        OutputFormat::Text => {
            if !quiet {
                print_outcome(&outcome);
            }
        }
    }

    if !outcome.passed() {
        process::exit(1);
    }
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Asserted { assertion, .. } if assertion.passed() => {
            println!(
                "PASS {}: {}",
                assertion.lookup_key, assertion.actual
            );
        }
        RunOutcome::Asserted { assertion, output } => {
            println!(
                "FAIL {}: expected {:?}, got {:?}",
                assertion.lookup_key, assertion.expected, assertion.actual
            );
            println!("{}", output);
        }
        RunOutcome::Crashed {
            exit_code,
            timed_out,
            output,
        } => {
            if *timed_out {
                println!("CRASH: run timed out");
            } else {
                match exit_code {
                    Some(code) => println!("CRASH: exit code {}", code),
                    None => println!("CRASH: terminated by signal"),
                }
            }
            println!("{}", output);
        }
        RunOutcome::ContractViolation { violation, output } => {
            println!("CONTRACT VIOLATION: {}", violation);
            println!("{}", output);
        }
    }
}
