//! Splits raw feature text into ordered scenarios and their step lines.

use serde::Serialize;

use crate::keyword::{feature_header, is_step_line, scenario_header};

/// A parsed feature document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSpec {
    /// Text after `Feature:`, empty when the document has no feature header.
    pub title: String,
    /// The full document, verbatim.
    pub text: String,
    pub scenarios: Vec<Scenario>,
}

/// One scenario (or scenario outline) block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub title: String,
    /// The header line plus every following line up to the next header,
    /// verbatim with indentation.
    pub text: String,
    /// Trimmed step lines in source order.
    pub steps: Vec<String>,
}

/// Parse feature text into scenarios.
///
/// Text before the first scenario header (feature description, background)
/// is discarded. A document without scenarios yields an empty list.
pub fn parse_feature(text: &str) -> FeatureSpec {
    let title = text
        .lines()
        .find_map(feature_header)
        .unwrap_or_default()
        .to_string();

    let mut scenarios = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some(header) = scenario_header(line) {
            if let Some((title, lines)) = current.take() {
                scenarios.push(build_scenario(title, &lines));
            }
            current = Some((header.to_string(), vec![line]));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some((title, lines)) = current {
        scenarios.push(build_scenario(title, &lines));
    }

    FeatureSpec {
        title,
        text: text.to_string(),
        scenarios,
    }
}

fn build_scenario(title: String, lines: &[&str]) -> Scenario {
    let steps = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| is_step_line(line))
        .map(str::to_string)
        .collect();
    Scenario {
        title,
        text: lines.join("\n"),
        steps,
    }
}

impl FeatureSpec {
    /// Total number of step lines across all scenarios.
    pub fn step_count(&self) -> usize {
        self.scenarios.iter().map(|s| s.steps.len()).sum()
    }
}
