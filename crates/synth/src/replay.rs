//! Recorded oracle responses for offline reruns.
//!
//! A recording is a JSON document:
//!
//! ```json
//! {
//!   "steps": { "Given a value of \"5\"": "---LOGIC---\ncontext.value = value" },
//!   "repairs": ["<corrected source for repair 1>"]
//! }
//! ```
//!
//! Step responses are keyed by the step line as written. Repair responses
//! are served in order.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::oracle::{RepairRequest, SynthesisBundle, SynthesisOracle};
use crate::OracleError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    #[serde(default)]
    pub steps: BTreeMap<String, String>,
    #[serde(default)]
    pub repairs: Vec<String>,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self, OracleError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| OracleError::ReplayFile(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| OracleError::ReplayFile(format!("invalid recording {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), OracleError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| OracleError::ReplayFile(e.to_string()))?;
        std::fs::write(path, json + "\n")
            .map_err(|e| OracleError::ReplayFile(format!("cannot write {}: {}", path.display(), e)))
    }
}

/// Serves responses from a [`Recording`]. A step missing from the
/// recording fails with [`OracleError::NotRecorded`], which the pipeline
/// treats like any other per-step oracle failure.
#[derive(Debug, Clone)]
pub struct ReplayOracle {
    recording: Recording,
    next_repair: usize,
}

impl ReplayOracle {
    pub fn new(recording: Recording) -> Self {
        ReplayOracle {
            recording,
            next_repair: 0,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, OracleError> {
        Ok(ReplayOracle::new(Recording::load(path)?))
    }
}

impl SynthesisOracle for ReplayOracle {
    fn synthesize(&mut self, bundle: &SynthesisBundle) -> Result<String, OracleError> {
        self.recording
            .steps
            .get(bundle.step_text.trim())
            .cloned()
            .ok_or_else(|| OracleError::NotRecorded(bundle.step_text.clone()))
    }

    fn repair(&mut self, request: &RepairRequest) -> Result<String, OracleError> {
        let response = self
            .recording
            .repairs
            .get(self.next_repair)
            .cloned()
            .ok_or_else(|| OracleError::NotRecorded(format!("repair attempt {}", request.attempt)))?;
        self.next_repair += 1;
        Ok(response)
    }
}

/// Passes calls through to `inner` and keeps every successful response so
/// the run can be replayed later.
pub struct RecordingOracle<O> {
    inner: O,
    recording: Recording,
}

impl<O: SynthesisOracle> RecordingOracle<O> {
    pub fn new(inner: O) -> Self {
        RecordingOracle {
            inner,
            recording: Recording::default(),
        }
    }

    pub fn recording(&self) -> &Recording {
        &self.recording
    }

    pub fn save(&self, path: &Path) -> Result<(), OracleError> {
        self.recording.save(path)
    }
}

impl<O: SynthesisOracle> SynthesisOracle for RecordingOracle<O> {
    fn synthesize(&mut self, bundle: &SynthesisBundle) -> Result<String, OracleError> {
        let response = self.inner.synthesize(bundle)?;
        self.recording
            .steps
            .insert(bundle.step_text.trim().to_string(), response.clone());
        Ok(response)
    }

    fn repair(&mut self, request: &RepairRequest) -> Result<String, OracleError> {
        let response = self.inner.repair(request)?;
        self.recording.repairs.push(response.clone());
        Ok(response)
    }
}
