//! Prompt construction for step synthesis and whole-unit repair.
//!
//! The system prompt fixes the backend contract (how configuration and
//! shared state are reached, how "then" steps report results, the response
//! format). The user prompt carries the per-step material.

use stepsmith_core::Backend;

use crate::oracle::{RepairRequest, SynthesisBundle};

// ── System prompts ───────────────────────────────────────────────────────────

/// System prompt for synthesizing one step body.
pub fn system_prompt(backend: Backend) -> String {
    format!(
        "You write the body of one {lang} step definition for the {harness} test harness.\n\
         The enclosing function signature, decorator and parameter binding already\n\
         exist. Write ONLY the statements that go inside the function.\n\
         \n\
         {access}\n\
         \n\
         ## Then steps: extract, don't assert\n\
         A Then step must not assert. It extracts the observed value and writes a JSON\n\
         file `{record}` (relative to the working directory of the test run) with exactly\n\
         two keys: `lookup_key`, a key of the configuration's `expected_outputs` map that\n\
         this step checks, and `actual_value`, the observed value as a string.\n\
         The comparison with the expected value happens outside the test run.\n\
         \n\
         {format}",
        lang = backend.language(),
        harness = harness_name(backend),
        access = state_access(backend),
        record = backend.result_record_path(),
        format = response_format(backend),
    )
}

/// System prompt for correcting a whole step-definition unit.
pub fn repair_system_prompt(backend: Backend) -> String {
    format!(
        "You fix {lang} step-definition source for the {harness} test harness.\n\
         The source was rejected by the toolchain. Return the COMPLETE corrected file,\n\
         keeping every step binding and function name unchanged. Change only what the\n\
         diagnostic requires. Do not add explanations.\n\
         \n\
         {access}\n\
         \n\
         Return the file inside a single fenced code block.",
        lang = backend.language(),
        harness = harness_name(backend),
        access = state_access(backend),
    )
}

fn harness_name(backend: Backend) -> &'static str {
    match backend {
        Backend::Behave => "Behave",
        Backend::Godog => "Godog",
        Backend::Cucumber => "Cucumber-JVM",
    }
}

fn state_access(backend: Backend) -> String {
    match backend {
        Backend::Behave => "## Configuration and state\n\
             The test configuration is a dict at `context.test_config`.\n\
             Keep values later steps need on `context`, e.g. `context.last_output = ...`.\n\
             Step parameters arrive as named function arguments."
            .to_string(),
        Backend::Godog => "## Configuration and state\n\
             The function is a method on `s *scenarioContext`. The test configuration is\n\
             `s.config` (a `map[string]interface{}`). Keep values later steps need as\n\
             fields on `s`, e.g. `s.lastOutput = out`, and declare every new field in the\n\
             CONTEXT-FIELDS section as `name Type`. The method returns `error`; return a\n\
             non-nil error only for failures, never `godog.ErrPending`."
            .to_string(),
        Backend::Cucumber => "## Configuration and state\n\
             The test configuration is the static Jackson `JsonNode testConfig`. The\n\
             static fields `String lastCommandOutput` and `int lastResponseStatusCode` exist\n\
             already; declare any other shared field in the CONTEXT-FIELDS section as\n\
             `Type name;`. The method may throw `Exception`."
            .to_string(),
    }
}

fn response_format(backend: Backend) -> String {
    let (import_example, field_example) = match backend {
        Backend::Behave => ("import subprocess", "(leave empty)"),
        Backend::Godog => ("\"os/exec\"", "lastOutput string"),
        Backend::Cucumber => ("import java.nio.file.Files;", "String lastBody;"),
    };
    format!(
        "## Response format\n\
         Answer with these three sections and nothing else:\n\
         ---IMPORTS---\n\
         one import per line, e.g. {import_example}\n\
         ---CONTEXT-FIELDS---\n\
         one shared field per line, e.g. {field_example}\n\
         ---LOGIC---\n\
         the function body\n\
         \n\
         Leave a section empty rather than omitting its marker. Do not repeat the function\n\
         signature. Do not use markdown fences."
    )
}

// ── User prompts ─────────────────────────────────────────────────────────────

/// User prompt for one step.
pub fn user_prompt(bundle: &SynthesisBundle) -> String {
    let mut prompt = format!(
        "## Feature\n\
         {}\n\
         \n\
         ## Scenario\n\
         {}\n\
         \n\
         ## Step to implement\n\
         {}\n\
         \n\
         ## Parameters\n\
         {}\n\
         \n\
         ## Test configuration\n\
         {}\n",
        bundle.feature_text.trim_end(),
        bundle.scenario_text.trim_end(),
        bundle.step_text,
        parameters(bundle),
        pretty(&bundle.config),
    );

    if !bundle.known_fields.is_empty() {
        prompt.push_str("\n## State set by earlier steps\n");
        for field in &bundle.known_fields {
            prompt.push_str("- ");
            prompt.push_str(field);
            prompt.push('\n');
        }
    }

    if let Some(diagnostic) = &bundle.prior_diagnostic {
        prompt.push_str("\n## Previous attempt failed with\n");
        prompt.push_str(diagnostic.trim_end());
        prompt.push('\n');
    }

    prompt
}

/// User prompt for a whole-unit repair.
pub fn repair_prompt(request: &RepairRequest) -> String {
    format!(
        "## Feature\n\
         {}\n\
         \n\
         ## Test configuration\n\
         {}\n\
         \n\
         ## Source (repair attempt {})\n\
         {}\n\
         \n\
         ## Toolchain diagnostic\n\
         {}\n",
        request.feature_text.trim_end(),
        pretty(&request.config),
        request.attempt,
        request.source.trim_end(),
        request.diagnostic.trim_end(),
    )
}

fn parameters(bundle: &SynthesisBundle) -> String {
    if bundle.param_names.is_empty() {
        return "(none)".to_string();
    }
    bundle
        .param_names
        .iter()
        .map(|name| match bundle.examples.get(name) {
            Some(example) => format!("- {} (example: \"{}\")", name, example),
            None => format!("- {} (from the Examples table)", name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepsmith_core::{extract_step, RoleResolver};

    fn bundle(line: &str, backend: Backend) -> SynthesisBundle {
        let (_, step) = extract_step(line, backend, RoleResolver::new()).unwrap();
        SynthesisBundle::for_step(
            &step,
            backend,
            "Feature: Calculator",
            "Scenario: add",
            &serde_json::json!({"expected_outputs": {"sum": "8"}}),
        )
    }

    #[test]
    fn system_prompt_names_result_record_per_backend() {
        assert!(system_prompt(Backend::Behave).contains("`test_result.json`"));
        assert!(system_prompt(Backend::Cucumber).contains("`target/test_result.json`"));
        assert!(system_prompt(Backend::Godog).contains("s.config"));
    }

    #[test]
    fn user_prompt_lists_parameters_and_examples() {
        let prompt = user_prompt(&bundle("When we add \"3\"", Backend::Behave));
        assert!(prompt.contains("When we add \"3\""));
        assert!(prompt.contains("- add (example: \"3\")"));
        assert!(prompt.contains("\"sum\": \"8\""));
        assert!(!prompt.contains("Previous attempt"));
    }

    #[test]
    fn user_prompt_carries_ledger_and_diagnostic() {
        let b = bundle("Then it is done", Backend::Godog)
            .with_known_fields(vec!["s.total (set by step: When we add)".into()])
            .with_diagnostic(Some("undefined: foo".into()));
        let prompt = user_prompt(&b);
        assert!(prompt.contains("Parameters\n(none)"));
        assert!(prompt.contains("- s.total (set by step: When we add)"));
        assert!(prompt.contains("## Previous attempt failed with\nundefined: foo"));
    }

    #[test]
    fn repair_prompt_includes_source_and_diagnostic() {
        let request = RepairRequest {
            backend: Backend::Cucumber,
            feature_text: "Feature: X".into(),
            config: serde_json::json!({}),
            source: "class StepDefinitions {}".into(),
            diagnostic: "cannot find symbol".into(),
            attempt: 2,
        };
        let prompt = repair_prompt(&request);
        assert!(prompt.contains("repair attempt 2"));
        assert!(prompt.contains("class StepDefinitions {}"));
        assert!(prompt.contains("cannot find symbol"));
    }
}
