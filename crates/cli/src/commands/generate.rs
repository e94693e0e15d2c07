use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::json;
use stepsmith_codegen::AssembledUnit;
use stepsmith_core::Backend;
use stepsmith_forge::{
    write_outputs, Forge, ForgeOutcome, ForgeSettings, ProjectSource, TestConfig,
    ToolchainValidator, ValidationVerdict, Validator, WrittenProject,
};
use stepsmith_synth::{
    ChatClient, ClientConfig, OracleError, PacedOracle, Pacing, PendingOracle, Provider,
    RecordingOracle, ReplayOracle, SynthesisOracle, TokenBucket,
};

use crate::{fail, print_json, OutputFormat};

pub(crate) struct GenerateArgs {
    pub feature: PathBuf,
    pub config: PathBuf,
    pub backend: Backend,
    pub out: PathBuf,
    pub max_repairs: u32,
    pub timeout_secs: u64,
    pub provider: Provider,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub pace_ms: u64,
    pub rate: Option<f64>,
    pub replay: Option<PathBuf>,
    pub record: Option<PathBuf>,
    pub dry_run: bool,
    pub no_validate: bool,
}

/// Accepts every unit as unverified.
struct SkipValidation;

impl Validator for SkipValidation {
    fn validate(&mut self, _unit: &AssembledUnit, attempt: u32) -> ValidationVerdict {
        ValidationVerdict::inconclusive(attempt, "validation skipped (--no-validate)")
    }
}

pub(crate) fn cmd_generate(args: &GenerateArgs, output: OutputFormat, quiet: bool) {
    let feature_text = match std::fs::read_to_string(&args.feature) {
        Ok(t) => t,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", args.feature.display(), e);
            fail(&msg, output, quiet);
        }
    };
    let config = match TestConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => fail(&format!("{}: {}", args.config.display(), e), output, quiet),
    };
    let oracle = match build_oracle(args) {
        Ok(o) => o,
        Err(e) => fail(&format!("oracle setup failed: {}", e), output, quiet),
    };

    let source = ProjectSource {
        feature_name: feature_file_name(&args.feature),
        feature_text,
        config,
    };
    let validator: Box<dyn Validator> = if args.no_validate {
        Box::new(SkipValidation)
    } else {
        Box::new(
            ToolchainValidator::new(source.clone())
                .with_timeout(Duration::from_secs(args.timeout_secs)),
        )
    };
    let oracle = PacedOracle::new(RecordingOracle::new(oracle), pacing(args));
    let settings = ForgeSettings::new(args.backend).with_max_repairs(args.max_repairs);

    let mut forge = Forge::new(oracle, validator, settings);
    let outcome = match forge.generate(&source.feature_text, &source.config.value) {
        Ok(o) => o,
        Err(e) => fail(&format!("{}: {}", args.feature.display(), e), output, quiet),
    };
    let written = match write_outputs(&outcome, &source, &args.out) {
        Ok(w) => w,
        Err(e) => fail(&e.to_string(), output, quiet),
    };

    if let Some(path) = &args.record {
        let (oracle, _) = forge.into_parts();
        if let Err(e) = oracle.into_inner().save(path) {
            fail(&format!("error saving recording: {}", e), output, quiet);
        }
    }

    match output {
        OutputFormat::Json => print_json(&summary_json(&outcome, &written)),
        OutputFormat::Text => {
            if !quiet {
                print_summary(&outcome, &written);
            }
        }
    }

    if !outcome.succeeded() {
        let msg = format!(
            "validation failed after {} repair(s): {}",
            outcome.repair.repairs, outcome.repair.verdict.diagnostic
        );
        fail(&msg, output, quiet);
    }
}

fn build_oracle(args: &GenerateArgs) -> Result<Box<dyn SynthesisOracle>, OracleError> {
    if args.dry_run {
        return Ok(Box::new(PendingOracle));
    }
    if let Some(path) = &args.replay {
        return Ok(Box::new(ReplayOracle::from_file(path)?));
    }
    let mut config = ClientConfig::from_env(args.provider)?;
    if let Some(model) = &args.model {
        config = config.with_model(model.as_str());
    }
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url);
    }
    Ok(Box::new(ChatClient::new(config)))
}

fn pacing(args: &GenerateArgs) -> Pacing {
    // Offline oracles answer instantly.
    if args.dry_run || args.replay.is_some() {
        return Pacing::None;
    }
    match args.rate {
        Some(rate) if rate > 0.0 => {
            Pacing::TokenBucket(TokenBucket::new(rate.ceil().max(1.0) as u32, rate))
        }
        _ if args.pace_ms == 0 => Pacing::None,
        _ => Pacing::Fixed(Duration::from_millis(args.pace_ms)),
    }
}

fn feature_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "generated.feature".to_string())
}

fn summary_json(outcome: &ForgeOutcome, written: &WrittenProject) -> serde_json::Value {
    let steps = &outcome.steps;
    json!({
        "feature": outcome.feature.title,
        "backend": outcome.backend.name(),
        "state": outcome.repair.state.as_str(),
        "unverified": outcome.repair.unverified(),
        "project_dir": written.project_dir.display().to_string(),
        "report": written.report.display().to_string(),
        "files": written.files.iter().map(|f| f.display().to_string()).collect::<Vec<_>>(),
        "steps": steps.records.len(),
        "reused": steps.records.iter().filter(|r| r.reused).count(),
        "placeholders": steps.records.iter().filter(|r| r.placeholder).count(),
        "skipped": steps.skipped.len(),
        "repairs": outcome.repair.repairs,
        "verdict": serde_json::to_value(&outcome.repair.verdict).unwrap_or_default(),
    })
}

fn print_summary(outcome: &ForgeOutcome, written: &WrittenProject) {
    let steps = &outcome.steps;
    println!(
        "{} project for '{}' written to {}",
        outcome.backend,
        outcome.feature.title,
        written.project_dir.display()
    );
    println!(
        "  steps:      {} ({} reused, {} placeholder, {} skipped)",
        steps.records.len(),
        steps.records.iter().filter(|r| r.reused).count(),
        steps.records.iter().filter(|r| r.placeholder).count(),
        steps.skipped.len()
    );
    for skipped in &steps.skipped {
        println!("    skipped: {} ({})", skipped.step, skipped.error);
    }
    let verdict = &outcome.repair.verdict;
    let mut status = format!(
        "{} ({}) after {} repair(s)",
        outcome.repair.state.as_str(),
        verdict.status.as_str(),
        outcome.repair.repairs
    );
    if outcome.repair.unverified() {
        status.push_str(", unverified");
    }
    println!("  validation: {}", status);
    println!("  report:     {}", written.report.display());
}
