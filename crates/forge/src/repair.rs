//! The bounded generate-validate-repair state machine.
//!
//! ```text
//! Draft ──▶ Validating ──Clean/Inconclusive──▶ Accepted
//!   ▲            │
//!   │     StructuralFailure
//!   │            ▼
//!   └──────── Repairing ──bound reached──▶ Rejected
//! ```
//!
//! Every failure passes through `Repairing` before the bound is checked, so
//! with bound `n` and a validator that always fails the loop makes exactly
//! `n` repair calls and `n + 1` validations.

use serde::Serialize;
use stepsmith_codegen::AssembledUnit;
use stepsmith_core::extract_source;
use stepsmith_synth::{RepairRequest, SynthesisOracle};

use crate::validate::{ValidationVerdict, Validator, VerdictStatus};

/// Default number of whole-unit repair attempts.
pub const DEFAULT_MAX_REPAIRS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairState {
    Draft,
    Validating,
    Repairing,
    Accepted,
    Rejected,
}

impl RepairState {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairState::Draft => "draft",
            RepairState::Validating => "validating",
            RepairState::Repairing => "repairing",
            RepairState::Accepted => "accepted",
            RepairState::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: RepairState,
    pub to: RepairState,
    /// Repairs made so far when the transition happened.
    pub attempt: u32,
}

/// Where the loop ended. The unit is the last draft in both terminal
/// states; a rejected unit is kept for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct RepairOutcome {
    pub state: RepairState,
    pub unit: AssembledUnit,
    /// The authoritative verdict: the last one produced.
    pub verdict: ValidationVerdict,
    pub repairs: u32,
    pub validations: u32,
    pub transitions: Vec<Transition>,
    /// Repair calls that did not produce a new draft, with their reasons.
    pub repair_failures: Vec<String>,
}

impl RepairOutcome {
    pub fn accepted(&self) -> bool {
        self.state == RepairState::Accepted
    }

    /// Accepted without a toolchain having confirmed it.
    pub fn unverified(&self) -> bool {
        self.accepted() && self.verdict.status == VerdictStatus::Inconclusive
    }
}

/// Context the repair oracle needs besides the unit itself.
#[derive(Debug, Clone)]
pub struct RepairContext<'a> {
    pub feature_text: &'a str,
    pub config: &'a serde_json::Value,
}

pub struct RepairLoop<'a, O: ?Sized, V: ?Sized> {
    oracle: &'a mut O,
    validator: &'a mut V,
    max_repairs: u32,
}

impl<'a, O, V> RepairLoop<'a, O, V>
where
    O: SynthesisOracle + ?Sized,
    V: Validator + ?Sized,
{
    pub fn new(oracle: &'a mut O, validator: &'a mut V, max_repairs: u32) -> Self {
        RepairLoop {
            oracle,
            validator,
            max_repairs,
        }
    }

    pub fn run(mut self, draft: AssembledUnit, ctx: &RepairContext<'_>) -> RepairOutcome {
        let mut unit = draft;
        let mut transitions = Vec::new();
        let mut repair_failures = Vec::new();
        let mut repairs = 0;
        let mut validations = 0;
        let mut state = RepairState::Draft;

        loop {
            record(&mut transitions, &mut state, RepairState::Validating, repairs);
            let verdict = self.validator.validate(&unit, repairs);
            validations += 1;

            match verdict.status {
                VerdictStatus::Clean | VerdictStatus::Inconclusive => {
                    if verdict.status == VerdictStatus::Inconclusive {
                        tracing::warn!(diagnostic = %verdict.diagnostic, "validation inconclusive; accepting unverified");
                    } else {
                        tracing::info!(repairs, "validation clean");
                    }
                    record(&mut transitions, &mut state, RepairState::Accepted, repairs);
                    return RepairOutcome {
                        state,
                        unit,
                        verdict,
                        repairs,
                        validations,
                        transitions,
                        repair_failures,
                    };
                }
                VerdictStatus::StructuralFailure => {
                    tracing::warn!(attempt = repairs, diagnostic = %verdict.diagnostic, "structural failure");
                    record(&mut transitions, &mut state, RepairState::Repairing, repairs);
                    if repairs >= self.max_repairs {
                        record(&mut transitions, &mut state, RepairState::Rejected, repairs);
                        return RepairOutcome {
                            state,
                            unit,
                            verdict,
                            repairs,
                            validations,
                            transitions,
                            repair_failures,
                        };
                    }
                    repairs += 1;
                    let request = RepairRequest {
                        backend: unit.backend,
                        feature_text: ctx.feature_text.to_string(),
                        config: ctx.config.clone(),
                        source: unit.primary().contents.clone(),
                        diagnostic: verdict.diagnostic.clone(),
                        attempt: repairs,
                    };
                    match self.oracle.repair(&request) {
                        Ok(raw) => {
                            let source = extract_source(&raw);
                            if source.is_empty() {
                                repair_failures.push(format!("repair {}: empty response", repairs));
                            } else {
                                unit = unit.with_primary_contents(ensure_trailing_newline(source));
                            }
                        }
                        Err(e) => {
                            tracing::warn!(attempt = repairs, error = %e, "repair call failed");
                            repair_failures.push(format!("repair {}: {}", repairs, e));
                        }
                    }
                    record(&mut transitions, &mut state, RepairState::Draft, repairs);
                }
            }
        }
    }
}

fn record(transitions: &mut Vec<Transition>, state: &mut RepairState, to: RepairState, attempt: u32) {
    transitions.push(Transition {
        from: *state,
        to,
        attempt,
    });
    *state = to;
}

fn ensure_trailing_newline(mut source: String) -> String {
    if !source.ends_with('\n') {
        source.push('\n');
    }
    source
}
