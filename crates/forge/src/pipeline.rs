//! Per-feature pipeline: parse, synthesize each step in order, assemble,
//! then validate and repair.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use stepsmith_codegen::assemble;
use stepsmith_core::{
    parse_feature, parse_feature_steps, sanitize, Backend, ContextLedger, FeatureSpec, FieldDecl,
    ParsedScenario, ParsedStep, StepIdentifier, StepMetadata,
};
use stepsmith_synth::{SynthesisBundle, SynthesisOracle};

use crate::repair::{RepairContext, RepairLoop, RepairOutcome, DEFAULT_MAX_REPAIRS};
use crate::validate::Validator;
use crate::ForgeError;

/// Diagnostic sent with the one retry of a step whose answer had no code.
const NO_CODE_DIAGNOSTIC: &str =
    "The previous answer contained no usable code. Answer with the three sections and a non-empty LOGIC section.";

#[derive(Debug, Clone, Copy)]
pub struct ForgeSettings {
    pub backend: Backend,
    pub max_repairs: u32,
}

impl ForgeSettings {
    pub fn new(backend: Backend) -> Self {
        ForgeSettings {
            backend,
            max_repairs: DEFAULT_MAX_REPAIRS,
        }
    }

    pub fn with_max_repairs(mut self, max_repairs: u32) -> Self {
        self.max_repairs = max_repairs;
        self
    }
}

/// How one step occurrence was handled.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub identifier: StepIdentifier,
    pub step: String,
    pub scenario: String,
    /// Served from an earlier occurrence of the same step.
    pub reused: bool,
    /// The answer had no usable code and the placeholder body was used.
    pub placeholder: bool,
}

/// A step left out of the unit because its oracle call failed.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedStep {
    pub identifier: StepIdentifier,
    pub step: String,
    pub scenario: String,
    pub error: String,
}

/// Synthesized steps of one feature, before assembly.
#[derive(Debug, Clone)]
pub struct Synthesized {
    pub metadata: Vec<StepMetadata>,
    pub records: Vec<StepRecord>,
    pub skipped: Vec<SkippedStep>,
    pub ledger: ContextLedger,
}

impl Synthesized {
    pub fn imports(&self) -> BTreeSet<String> {
        self.metadata
            .iter()
            .flat_map(|m| m.imports().iter().cloned())
            .collect()
    }

    pub fn fields(&self) -> Vec<FieldDecl> {
        self.metadata
            .iter()
            .flat_map(|m| m.fields().iter().cloned())
            .collect()
    }
}

/// Everything produced for one feature.
#[derive(Debug, Clone)]
pub struct ForgeOutcome {
    pub backend: Backend,
    pub feature: FeatureSpec,
    pub steps: Synthesized,
    pub repair: RepairOutcome,
}

impl ForgeOutcome {
    pub fn succeeded(&self) -> bool {
        self.repair.accepted()
    }
}

/// Drives one oracle and one validator over features, one at a time.
pub struct Forge<O, V> {
    oracle: O,
    validator: V,
    settings: ForgeSettings,
}

impl<O: SynthesisOracle, V: Validator> Forge<O, V> {
    pub fn new(oracle: O, validator: V, settings: ForgeSettings) -> Self {
        Forge {
            oracle,
            validator,
            settings,
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn into_parts(self) -> (O, V) {
        (self.oracle, self.validator)
    }

    /// Run the whole pipeline over `feature_text`.
    pub fn generate(
        &mut self,
        feature_text: &str,
        config: &serde_json::Value,
    ) -> Result<ForgeOutcome, ForgeError> {
        let backend = self.settings.backend;
        let feature = parse_feature(feature_text);
        let scenarios = parse_feature_steps(&feature, backend)?;
        tracing::info!(
            feature = %feature.title,
            scenarios = scenarios.len(),
            steps = feature.step_count(),
            %backend,
            "generating"
        );

        let steps = self.synthesize_steps(&feature, &scenarios, config);
        let draft = assemble(&steps.metadata, &steps.imports(), &steps.fields(), backend)?;

        let ctx = RepairContext {
            feature_text: &feature.text,
            config,
        };
        let repair = RepairLoop::new(&mut self.oracle, &mut self.validator, self.settings.max_repairs)
            .run(draft, &ctx);

        Ok(ForgeOutcome {
            backend,
            feature,
            steps,
            repair,
        })
    }

    /// Synthesize every step in written order. Each request sees the state
    /// fields earlier steps introduced. A step seen before reuses its body
    /// without another oracle call; a step whose call fails is skipped.
    pub fn synthesize_steps(
        &mut self,
        feature: &FeatureSpec,
        scenarios: &[ParsedScenario],
        config: &serde_json::Value,
    ) -> Synthesized {
        let backend = self.settings.backend;
        let mut ledger = ContextLedger::new(backend);
        let mut cache: HashMap<StepIdentifier, (StepMetadata, bool)> = HashMap::new();
        let mut metadata = Vec::new();
        let mut records = Vec::new();
        let mut skipped = Vec::new();

        for scenario in scenarios {
            for step in &scenario.steps {
                if let Some((known, placeholder)) = cache.get(&step.identifier) {
                    tracing::debug!(step = %step.source, "reusing earlier body");
                    metadata.push(known.for_occurrence(step.clone()));
                    records.push(StepRecord {
                        identifier: step.identifier.clone(),
                        step: step.source.clone(),
                        scenario: scenario.title.clone(),
                        reused: true,
                        placeholder: *placeholder,
                    });
                    continue;
                }

                let bundle = SynthesisBundle::for_step(step, backend, &feature.text, &scenario.text, config)
                    .with_known_fields(ledger.describe());
                match self.synthesize_one(step, bundle) {
                    Ok((meta, placeholder)) => {
                        let new_fields = ledger.observe(&meta, &scenario.title);
                        if !new_fields.is_empty() {
                            tracing::debug!(step = %step.source, fields = ?new_fields, "new state fields");
                        }
                        records.push(StepRecord {
                            identifier: step.identifier.clone(),
                            step: step.source.clone(),
                            scenario: scenario.title.clone(),
                            reused: false,
                            placeholder,
                        });
                        cache.insert(step.identifier.clone(), (meta.clone(), placeholder));
                        metadata.push(meta);
                    }
                    Err(e) => {
                        tracing::warn!(step = %step.source, error = %e, "oracle call failed; skipping step");
                        skipped.push(SkippedStep {
                            identifier: step.identifier.clone(),
                            step: step.source.clone(),
                            scenario: scenario.title.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        Synthesized {
            metadata,
            records,
            skipped,
            ledger,
        }
    }

    fn synthesize_one(
        &mut self,
        step: &ParsedStep,
        bundle: SynthesisBundle,
    ) -> Result<(StepMetadata, bool), stepsmith_synth::OracleError> {
        let backend = self.settings.backend;
        let raw = self.oracle.synthesize(&bundle)?;
        let mut cleaned = sanitize(&raw, backend);
        if cleaned.degenerate && !raw.trim().is_empty() {
            tracing::debug!(step = %step.source, "answer had no code; asking once more");
            let retry = bundle.with_diagnostic(Some(NO_CODE_DIAGNOSTIC.to_string()));
            match self.oracle.synthesize(&retry) {
                Ok(answer) => cleaned = sanitize(&answer, backend),
                Err(e) => {
                    tracing::warn!(step = %step.source, error = %e, "retry failed; using placeholder");
                }
            }
        }
        let placeholder = cleaned.degenerate;
        Ok((StepMetadata::new(step.clone(), cleaned), placeholder))
    }
}
