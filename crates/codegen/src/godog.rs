//! Go step definitions for Godog.

use std::collections::BTreeSet;
use std::path::PathBuf;

use stepsmith_core::{Backend, FieldDecl, StepMetadata};

use crate::{indent, templates, AssembledUnit, SourceBlob};

pub const STEPS_FILE: &str = "main_test.go";

const CONTEXT_IMPORT: &str = "\"context\"";

/// Import specs the skeleton itself needs.
const FIXED_IMPORTS: &[&str] = &[
    CONTEXT_IMPORT,
    "\"encoding/json\"",
    "\"os\"",
    "\"testing\"",
    "\"github.com/cucumber/godog\"",
];

pub(crate) fn assemble(
    steps: &[&StepMetadata],
    imports: &BTreeSet<String>,
    fields: &[FieldDecl],
) -> AssembledUnit {
    let mut out = String::from("package main\n\nimport (\n");
    // Only step signatures use `context`; Go rejects unused imports.
    for spec in FIXED_IMPORTS[..4]
        .iter()
        .filter(|spec| !steps.is_empty() || **spec != CONTEXT_IMPORT)
    {
        out.push_str(&format!("\t{}\n", spec));
    }
    let extra: Vec<&String> = imports
        .iter()
        .filter(|spec| !FIXED_IMPORTS.contains(&spec.as_str()))
        .collect();
    for spec in &extra {
        out.push_str(&format!("\t{}\n", spec));
    }
    out.push_str(&format!("\n\t{}\n)\n\n", FIXED_IMPORTS[4]));

    out.push_str("type scenarioContext struct {\n\tconfig map[string]interface{}\n");
    for field in fields {
        out.push_str(&format!("\t{}\n", field.render(Backend::Godog)));
    }
    out.push_str("}\n\n");
    out.push_str(&templates::godog_config_loader());

    for meta in steps {
        out.push('\n');
        out.push_str(&render_step(meta));
    }

    out.push_str("\nfunc InitializeScenario(ctx *godog.ScenarioContext) {\n");
    if !steps.is_empty() {
        out.push_str("\ts := newScenarioContext()\n");
    }
    for meta in steps {
        out.push_str(&format!(
            "\tctx.Step({}, s.{})\n",
            go_string(&format!("^{}$", meta.step().pattern)),
            meta.identifier()
        ));
    }
    out.push_str("}\n\n");
    out.push_str(&templates::godog_test_suite());

    let primary = SourceBlob {
        path: PathBuf::from(STEPS_FILE),
        contents: out,
    };
    let support = vec![SourceBlob {
        path: PathBuf::from("go.mod"),
        contents: templates::go_mod(),
    }];
    AssembledUnit::new(Backend::Godog, primary, support)
}

fn render_step(meta: &StepMetadata) -> String {
    let step = meta.step();
    let mut params = vec!["ctx context.Context".to_string()];
    params.extend(step.slots.iter().map(|s| format!("{} string", s.name)));
    let logic = meta.logic();
    let mut body = indent(logic, "\t");
    if !ends_with_return(logic) {
        body.push_str("\n\treturn nil");
    }
    format!(
        "func (s *scenarioContext) {name}({params}) error {{\n{body}\n}}\n",
        name = meta.identifier(),
        params = params.join(", "),
        body = body,
    )
}

fn ends_with_return(logic: &str) -> bool {
    logic
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|line| line == "return" || line.starts_with("return "))
}

/// A Go string literal: raw when possible, interpreted otherwise.
fn go_string(text: &str) -> String {
    if text.contains('`') {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        format!("`{}`", text)
    }
}
