//! Frozen per-step synthesis results handed to the assembler.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::backend::Backend;
use crate::identifier::StepIdentifier;
use crate::sanitize::{FieldDecl, SanitizedResponse};
use crate::step::ParsedStep;

/// A parsed step together with its sanitized logic, imports and auxiliary
/// fields. Frozen once built; the assembler only reads it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepMetadata {
    step: ParsedStep,
    logic: String,
    imports: BTreeSet<String>,
    fields: Vec<FieldDecl>,
}

impl StepMetadata {
    pub fn new(step: ParsedStep, response: SanitizedResponse) -> Self {
        StepMetadata {
            step,
            logic: response.logic,
            imports: response.imports,
            fields: response.fields,
        }
    }

    /// Metadata whose body is the backend's pending placeholder. Used for
    /// dry runs and in tests.
    pub fn pending(step: ParsedStep, backend: Backend) -> Self {
        StepMetadata {
            step,
            logic: backend.placeholder_body().to_string(),
            imports: BTreeSet::new(),
            fields: Vec::new(),
        }
    }

    /// Reuse the synthesized body of an earlier occurrence of the same
    /// step for a new occurrence (same identifier, possibly different
    /// example values).
    pub fn for_occurrence(&self, step: ParsedStep) -> Self {
        StepMetadata {
            step,
            logic: self.logic.clone(),
            imports: self.imports.clone(),
            fields: self.fields.clone(),
        }
    }

    pub fn step(&self) -> &ParsedStep {
        &self.step
    }

    pub fn identifier(&self) -> &StepIdentifier {
        &self.step.identifier
    }

    pub fn logic(&self) -> &str {
        &self.logic
    }

    pub fn imports(&self) -> &BTreeSet<String> {
        &self.imports
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }
}
