//! Java step definitions for Cucumber-JVM.

use std::collections::BTreeSet;
use std::path::PathBuf;

use stepsmith_core::{Backend, FieldDecl, StepMetadata};

use crate::{indent, templates, AssembledUnit, SourceBlob};

pub const STEPS_FILE: &str = "src/test/java/stepdefinitions/StepDefinitions.java";

const FIXED_IMPORTS: &[&str] = &[
    "import io.cucumber.java.en.Given;",
    "import io.cucumber.java.en.When;",
    "import io.cucumber.java.en.Then;",
    "import com.fasterxml.jackson.databind.JsonNode;",
    "import com.fasterxml.jackson.databind.ObjectMapper;",
    "import java.io.InputStream;",
];

pub(crate) fn assemble(
    steps: &[&StepMetadata],
    imports: &BTreeSet<String>,
    fields: &[FieldDecl],
) -> AssembledUnit {
    let mut out = String::from("package stepdefinitions;\n\n");
    for line in FIXED_IMPORTS {
        out.push_str(line);
        out.push('\n');
    }
    for line in imports.iter().filter(|i| !FIXED_IMPORTS.contains(&i.as_str())) {
        out.push_str(line);
        out.push('\n');
    }

    out.push_str("\npublic class StepDefinitions {\n\n");
    out.push_str("    public static JsonNode testConfig;\n");
    out.push_str("    public static String lastCommandOutput;\n");
    out.push_str("    public static int lastResponseStatusCode;\n");
    for field in fields {
        out.push_str(&format!("    {}\n", field.render(Backend::Cucumber)));
    }
    out.push('\n');
    out.push_str(&templates::cucumber_config_loader());

    for meta in steps {
        out.push('\n');
        out.push_str(&indent(&render_step(meta), "    "));
        out.push('\n');
    }
    out.push_str("}\n");

    let primary = SourceBlob {
        path: PathBuf::from(STEPS_FILE),
        contents: out,
    };
    let support = vec![
        SourceBlob {
            path: PathBuf::from("src/test/java/runner/TestRunner.java"),
            contents: templates::cucumber_runner(),
        },
        SourceBlob {
            path: PathBuf::from("pom.xml"),
            contents: templates::pom_xml(),
        },
    ];
    AssembledUnit::new(Backend::Cucumber, primary, support)
}

fn render_step(meta: &StepMetadata) -> String {
    let step = meta.step();
    let params: Vec<String> = step
        .slots
        .iter()
        .map(|s| format!("String {}", s.name))
        .collect();
    format!(
        "@{annotation}({pattern})\npublic void {name}({params}) throws Exception {{\n{body}\n}}",
        annotation = step.role.title_case(),
        pattern = java_string(&step.pattern),
        name = meta.identifier(),
        params = params.join(", "),
        body = indent(meta.logic(), "    "),
    )
}

fn java_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepsmith_core::{extract_step, sanitize, RoleResolver};

    #[test]
    fn annotated_methods_with_string_parameters() {
        let (_, step) = extract_step(
            "Then the path \"a\" maps to /b",
            Backend::Cucumber,
            RoleResolver::new(),
        )
        .unwrap();
        let meta = StepMetadata::new(
            step,
            sanitize("lastCommandOutput = path;", Backend::Cucumber),
        );
        let fields = vec![FieldDecl {
            name: "token".into(),
            ty: "String".into(),
        }];
        let unit = assemble(&[&meta], &BTreeSet::new(), &fields);
        let src = &unit.primary().contents;
        assert!(src.contains("    public static String token;\n"));
        assert!(src.contains("    @Then(\"the path {string} maps to \\\\/b\")\n"));
        assert!(src.contains(&format!(
            "    public void {}(String path) throws Exception {{\n        lastCommandOutput = path;\n    }}",
            meta.identifier()
        )));
        assert!(src.ends_with("}\n"));
        let paths: Vec<_> = unit.blobs.iter().map(|b| b.path.clone()).collect();
        assert!(paths.contains(&PathBuf::from("pom.xml")));
    }
}
