//! Python step definitions for Behave.

use std::collections::BTreeSet;
use std::path::PathBuf;

use stepsmith_core::{Backend, StepMetadata};

use crate::{indent, templates, AssembledUnit, SourceBlob};

pub const STEPS_FILE: &str = "features/steps/step_definitions.py";

const FIXED_IMPORTS: &[&str] = &["from behave import given, when, then"];

pub(crate) fn assemble(steps: &[&StepMetadata], imports: &BTreeSet<String>) -> AssembledUnit {
    let mut out = String::new();
    for line in FIXED_IMPORTS {
        out.push_str(line);
        out.push('\n');
    }
    for line in imports.iter().filter(|i| !FIXED_IMPORTS.contains(&i.as_str())) {
        out.push_str(line);
        out.push('\n');
    }

    for meta in steps {
        out.push_str("\n\n");
        out.push_str(&render_step(meta));
    }

    let primary = SourceBlob {
        path: PathBuf::from(STEPS_FILE),
        contents: out,
    };
    let support = vec![SourceBlob {
        path: PathBuf::from("features/environment.py"),
        contents: templates::behave_environment(),
    }];
    AssembledUnit::new(Backend::Behave, primary, support)
}

fn render_step(meta: &StepMetadata) -> String {
    let step = meta.step();
    let mut params = vec!["context".to_string()];
    params.extend(step.slots.iter().map(|s| s.name.clone()));
    format!(
        "@{role}({pattern})\ndef {name}({params}):\n{body}\n",
        role = step.role,
        pattern = python_string(&step.pattern),
        name = meta.identifier(),
        params = params.join(", "),
        body = indent(meta.logic(), "    "),
    )
}

/// Single-quoted Python string literal.
fn python_string(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepsmith_core::{extract_step, sanitize, RoleResolver};

    #[test]
    fn renders_decorated_functions_with_context_first() {
        let (_, step) =
            extract_step("Given a value of \"5\"", Backend::Behave, RoleResolver::new()).unwrap();
        let meta = StepMetadata::new(step, sanitize("context.value = int(of)", Backend::Behave));
        let imports = BTreeSet::from(["import json".to_string()]);
        let unit = assemble(&[&meta], &imports);
        let src = &unit.primary().contents;
        assert!(src.starts_with("from behave import given, when, then\nimport json\n"));
        assert!(src.contains("@given('a value of \"{of}\"')\n"));
        assert!(src.contains(&format!("def {}(context, of):\n    context.value = int(of)\n", meta.identifier())));
        assert_eq!(unit.blobs.len(), 2);
    }

    #[test]
    fn quotes_in_patterns_are_escaped() {
        assert_eq!(python_string("it's"), r"'it\'s'");
        assert_eq!(python_string(r"a\b"), r"'a\\b'");
    }
}
