use std::path::Path;

use serde_json::json;
use stepsmith_core::{parse_feature, parse_feature_steps, Backend};

use crate::{fail, print_json, OutputFormat};

pub(crate) fn cmd_parse(feature_path: &Path, backend: Backend, output: OutputFormat, quiet: bool) {
    let text = match std::fs::read_to_string(feature_path) {
        Ok(t) => t,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", feature_path.display(), e);
            fail(&msg, output, quiet);
        }
    };

    let feature = parse_feature(&text);
    let scenarios = match parse_feature_steps(&feature, backend) {
        Ok(s) => s,
        Err(e) => fail(&format!("{}: {}", feature_path.display(), e), output, quiet),
    };

    match output {
        OutputFormat::Json => {
            let scenarios = serde_json::to_value(&scenarios).unwrap_or_default();
            print_json(&json!({
                "feature": feature.title,
                "backend": backend.name(),
                "steps": feature.step_count(),
                "scenarios": scenarios,
            }));
        }
        OutputFormat::Text => {
            println!(
                "Feature: {} ({} scenario(s), {} step(s), backend {})",
                feature.title,
                scenarios.len(),
                feature.step_count(),
                backend
            );
            for scenario in &scenarios {
                println!();
                println!("  Scenario: {}", scenario.title);
                for step in &scenario.steps {
                    println!("    [{}] {}", step.role, step.source);
                    println!("        pattern:    {}", step.pattern);
                    println!("        identifier: {}", step.identifier.as_str());
                    if !step.slots.is_empty() {
                        let params: Vec<String> = step
                            .slots
                            .iter()
                            .map(|slot| match &slot.example {
                                Some(example) => format!("{}={:?}", slot.name, example),
                                None => slot.name.clone(),
                            })
                            .collect();
                        println!("        params:     {}", params.join(", "));
                    }
                }
            }
        }
    }
}
