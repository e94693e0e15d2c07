//! The synthesis oracle capability and its request types.

use std::collections::BTreeMap;

use serde::Serialize;
use stepsmith_core::{Backend, ParsedStep};

use crate::OracleError;

/// Everything the oracle gets for one step. Each call is stateless;
/// continuity across steps travels in `known_fields` and the texts.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisBundle {
    pub feature_text: String,
    pub scenario_text: String,
    /// The step line as written, keyword included.
    pub step_text: String,
    pub backend: Backend,
    pub param_names: Vec<String>,
    /// Parameter name to the literal written in the feature file.
    pub examples: BTreeMap<String, String>,
    /// Free-form test configuration, passed through untouched.
    pub config: serde_json::Value,
    /// Shared state fields earlier steps introduced, one description each.
    pub known_fields: Vec<String>,
    pub prior_diagnostic: Option<String>,
}

impl SynthesisBundle {
    pub fn for_step(
        step: &ParsedStep,
        backend: Backend,
        feature_text: &str,
        scenario_text: &str,
        config: &serde_json::Value,
    ) -> Self {
        let examples = step
            .slots
            .iter()
            .filter_map(|slot| slot.example.clone().map(|value| (slot.name.clone(), value)))
            .collect();
        SynthesisBundle {
            feature_text: feature_text.to_string(),
            scenario_text: scenario_text.to_string(),
            step_text: step.source.clone(),
            backend,
            param_names: step.slots.iter().map(|s| s.name.clone()).collect(),
            examples,
            config: config.clone(),
            known_fields: Vec::new(),
            prior_diagnostic: None,
        }
    }

    pub fn with_known_fields(mut self, fields: Vec<String>) -> Self {
        self.known_fields = fields;
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: Option<String>) -> Self {
        self.prior_diagnostic = diagnostic;
        self
    }
}

/// A whole-unit correction request: the full step-definition source and
/// the diagnostic that rejected it.
#[derive(Debug, Clone, Serialize)]
pub struct RepairRequest {
    pub backend: Backend,
    pub feature_text: String,
    pub config: serde_json::Value,
    pub source: String,
    pub diagnostic: String,
    /// 1-based repair attempt number.
    pub attempt: u32,
}

/// Source of candidate code. Responses are untrusted text.
pub trait SynthesisOracle {
    /// Candidate body for one step.
    fn synthesize(&mut self, bundle: &SynthesisBundle) -> Result<String, OracleError>;

    /// Corrected version of a whole step-definition unit.
    fn repair(&mut self, request: &RepairRequest) -> Result<String, OracleError>;
}

impl<T: SynthesisOracle + ?Sized> SynthesisOracle for Box<T> {
    fn synthesize(&mut self, bundle: &SynthesisBundle) -> Result<String, OracleError> {
        (**self).synthesize(bundle)
    }

    fn repair(&mut self, request: &RepairRequest) -> Result<String, OracleError> {
        (**self).repair(request)
    }
}

/// Answers every step with an empty body, so every step gets the backend's
/// pending placeholder, and hands repair requests back unchanged. Used for
/// dry runs that exercise parsing, assembly and validation offline.
#[derive(Debug, Default, Clone, Copy)]
pub struct PendingOracle;

impl SynthesisOracle for PendingOracle {
    fn synthesize(&mut self, _bundle: &SynthesisBundle) -> Result<String, OracleError> {
        Ok(String::new())
    }

    fn repair(&mut self, request: &RepairRequest) -> Result<String, OracleError> {
        Ok(request.source.clone())
    }
}
