//! Writing a generated project and its machine-readable run report.

use std::path::{Path, PathBuf};

use serde::Serialize;
use stepsmith_codegen::write_project;
use stepsmith_core::{Backend, Provenance};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::pipeline::{ForgeOutcome, SkippedStep, StepRecord};
use crate::repair::{RepairState, Transition};
use crate::validate::{ProjectSource, ValidationVerdict};
use crate::ForgeError;

/// File name of the run report inside the output directory.
pub const REPORT_FILE: &str = "stepsmith-report.json";

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub field: String,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub backend: Backend,
    pub feature: String,
    pub feature_file: String,
    pub generated_at: String,
    pub project_dir: PathBuf,
    pub state: RepairState,
    pub unverified: bool,
    pub verdict: ValidationVerdict,
    pub repairs: u32,
    pub validations: u32,
    pub steps: Vec<StepRecord>,
    pub skipped: Vec<SkippedStep>,
    pub state_fields: Vec<LedgerEntry>,
    pub transitions: Vec<Transition>,
    pub repair_failures: Vec<String>,
}

impl RunReport {
    pub fn new(outcome: &ForgeOutcome, feature_file: &str, project_dir: &Path) -> Self {
        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());
        RunReport {
            backend: outcome.backend,
            feature: outcome.feature.title.clone(),
            feature_file: feature_file.to_string(),
            generated_at,
            project_dir: project_dir.to_path_buf(),
            state: outcome.repair.state,
            unverified: outcome.repair.unverified(),
            verdict: outcome.repair.verdict.clone(),
            repairs: outcome.repair.repairs,
            validations: outcome.repair.validations,
            steps: outcome.steps.records.clone(),
            skipped: outcome.steps.skipped.clone(),
            state_fields: outcome
                .steps
                .ledger
                .iter()
                .map(|(field, provenance)| LedgerEntry {
                    field: field.to_string(),
                    provenance: provenance.clone(),
                })
                .collect(),
            transitions: outcome.repair.transitions.clone(),
            repair_failures: outcome.repair.repair_failures.clone(),
        }
    }
}

/// Paths written for one generated feature.
#[derive(Debug, Clone)]
pub struct WrittenProject {
    pub project_dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub report: PathBuf,
}

/// Write the final unit under `<out>/<backend>/`, a copy of the feature
/// under `<out>/features/`, and the report. Rejected units are written
/// too so they can be inspected.
pub fn write_outputs(
    outcome: &ForgeOutcome,
    source: &ProjectSource,
    out: &Path,
) -> Result<WrittenProject, ForgeError> {
    let project_dir = out.join(outcome.backend.name());
    let mut files = write_project(&outcome.repair.unit, &source.inputs(), &project_dir)?;

    let feature_copy = out.join("features").join(&source.feature_name);
    write(&feature_copy, &source.feature_text)?;
    files.push(feature_copy);

    let report = RunReport::new(outcome, &source.feature_name, &project_dir);
    let report_path = out.join(REPORT_FILE);
    let mut json = serde_json::to_string_pretty(&report)?;
    json.push('\n');
    write(&report_path, &json)?;

    tracing::info!(dir = %project_dir.display(), files = files.len(), "wrote project");
    Ok(WrittenProject {
        project_dir,
        files,
        report: report_path,
    })
}

fn write(path: &Path, contents: &str) -> Result<(), ForgeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ForgeError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| ForgeError::Io {
        path: path.to_path_buf(),
        source,
    })
}
