//! stepsmith-codegen: renders step metadata into backend source units and
//! writes them out as runnable projects.
//!
//! [`assemble()`] is a pure function from ordered step metadata to an
//! [`AssembledUnit`]. It dispatches to one skeleton module per backend and
//! performs no semantic checks on the step logic.

pub mod behave;
pub mod cucumber;
pub mod error;
pub mod godog;
pub mod layout;
pub mod templates;

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use stepsmith_core::{Backend, FieldDecl, StepMetadata};

pub use error::CodegenError;
pub use layout::{write_project, ProjectInputs, CONFIG_FILE};

/// One named source file of an assembled unit, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceBlob {
    pub path: PathBuf,
    pub contents: String,
}

/// The generated sources for one feature and backend.
///
/// The primary blob holds the step definitions; the rest are support files
/// (hooks, build manifests, runners) that never contain oracle output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledUnit {
    pub backend: Backend,
    pub blobs: Vec<SourceBlob>,
    primary: usize,
}

impl AssembledUnit {
    pub(crate) fn new(backend: Backend, primary: SourceBlob, support: Vec<SourceBlob>) -> Self {
        let mut blobs = vec![primary];
        blobs.extend(support);
        AssembledUnit {
            backend,
            blobs,
            primary: 0,
        }
    }

    pub fn primary(&self) -> &SourceBlob {
        &self.blobs[self.primary]
    }

    /// Swap in corrected step-definition source, keeping the support files.
    pub fn with_primary_contents(&self, contents: String) -> Self {
        let mut next = self.clone();
        next.blobs[next.primary].contents = contents;
        next
    }

    pub fn get(&self, path: &Path) -> Option<&SourceBlob> {
        self.blobs.iter().find(|b| b.path == path)
    }
}

/// Render a unit from steps in scenario-written order.
///
/// A step whose identifier or binding key was already rendered is skipped:
/// the earlier function serves every later occurrence. Fields the skeleton
/// already declares are dropped; two fields with the same name but
/// different types are an error.
pub fn assemble(
    steps: &[StepMetadata],
    imports: &BTreeSet<String>,
    fields: &[FieldDecl],
    backend: Backend,
) -> Result<AssembledUnit, CodegenError> {
    let unique = unique_steps(steps, backend);
    let fields = merge_fields(fields, backend)?;
    let unit = match backend {
        Backend::Behave => behave::assemble(&unique, imports),
        Backend::Godog => godog::assemble(&unique, imports, &fields),
        Backend::Cucumber => cucumber::assemble(&unique, imports, &fields),
    };
    Ok(unit)
}

/// Steps with duplicate identifiers or binding keys removed, order kept.
pub fn unique_steps(steps: &[StepMetadata], backend: Backend) -> Vec<&StepMetadata> {
    let mut ids = HashSet::new();
    let mut bindings = HashSet::new();
    steps
        .iter()
        .filter(|m| {
            let new_id = ids.insert(m.identifier().clone());
            let new_binding = bindings.insert(m.step().binding_key(backend));
            new_id && new_binding
        })
        .collect()
}

fn merge_fields(fields: &[FieldDecl], backend: Backend) -> Result<Vec<FieldDecl>, CodegenError> {
    let builtin = backend.builtin_state_fields();
    let mut merged: Vec<FieldDecl> = Vec::new();
    for field in fields {
        if builtin.contains(&field.name.as_str()) {
            continue;
        }
        match merged.iter().find(|f| f.name == field.name) {
            Some(existing) if existing.ty != field.ty => {
                return Err(CodegenError::ConflictingField {
                    name: field.name.clone(),
                    first: existing.ty.clone(),
                    second: field.ty.clone(),
                });
            }
            Some(_) => {}
            None => merged.push(field.clone()),
        }
    }
    Ok(merged)
}

/// Prefix every non-blank line of `text` with `prefix`.
pub(crate) fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepsmith_core::{extract_step, RoleResolver};

    fn meta(line: &str, backend: Backend) -> StepMetadata {
        let (_, step) = extract_step(line, backend, RoleResolver::new()).unwrap();
        StepMetadata::pending(step, backend)
    }

    #[test]
    fn duplicate_identifiers_render_once() {
        let steps = vec![
            meta("Given the service is running", Backend::Godog),
            meta("When it is called", Backend::Godog),
            meta("Given the service is running", Backend::Godog),
        ];
        let unique = unique_steps(&steps, Backend::Godog);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].step().remainder, "the service is running");
        assert_eq!(unique[1].step().remainder, "it is called");
    }

    #[test]
    fn literal_variants_share_a_binding() {
        let steps = vec![
            meta("Given a value of \"5\"", Backend::Cucumber),
            meta("Given a value of \"6\"", Backend::Cucumber),
        ];
        assert_ne!(steps[0].identifier(), steps[1].identifier());
        assert_eq!(unique_steps(&steps, Backend::Cucumber).len(), 1);
    }

    #[test]
    fn conflicting_field_types_are_rejected() {
        let fields = vec![
            FieldDecl { name: "status".into(), ty: "int".into() },
            FieldDecl { name: "status".into(), ty: "string".into() },
        ];
        let err = assemble(&[], &BTreeSet::new(), &fields, Backend::Godog).unwrap_err();
        assert!(matches!(err, CodegenError::ConflictingField { .. }));
    }

    #[test]
    fn builtin_fields_are_not_redeclared() {
        let fields = vec![
            FieldDecl { name: "config".into(), ty: "map[string]interface{}".into() },
            FieldDecl { name: "total".into(), ty: "int".into() },
        ];
        let unit = assemble(&[], &BTreeSet::new(), &fields, Backend::Godog).unwrap();
        let src = &unit.primary().contents;
        assert_eq!(src.matches("config map[string]interface{}").count(), 1);
        assert!(src.contains("\ttotal int"));
    }

    #[test]
    fn replacing_primary_keeps_support_files() {
        let unit = assemble(&[], &BTreeSet::new(), &[], Backend::Cucumber).unwrap();
        let fixed = unit.with_primary_contents("class X {}".into());
        assert_eq!(fixed.primary().contents, "class X {}");
        assert_eq!(fixed.blobs.len(), unit.blobs.len());
        assert_eq!(fixed.blobs[1], unit.blobs[1]);
    }
}
