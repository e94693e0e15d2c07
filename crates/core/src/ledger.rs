//! Cross-step knowledge of shared scenario state within one feature.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::backend::Backend;
use crate::identifier::StepIdentifier;
use crate::metadata::StepMetadata;

/// Where a state field was first seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub step: StepIdentifier,
    pub step_text: String,
    pub scenario: String,
}

/// Append-only map of state-field name to the step that introduced it.
///
/// Entries are never removed or overwritten; the first step to touch a
/// field owns its provenance for the rest of the run.
#[derive(Debug, Clone, Serialize)]
pub struct ContextLedger {
    #[serde(skip)]
    backend: Backend,
    entries: BTreeMap<String, Provenance>,
}

static BEHAVE_STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bcontext\.([A-Za-z_]\w*)(\s*\()?").expect("behave state regex"));

static GODOG_STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bs\.([A-Za-z_]\w*)(\s*\()?").expect("godog state regex"));

static CUCUMBER_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bStepDefinitions\.([A-Za-z_]\w*)(\s*\()?").expect("cucumber state regex")
});

impl ContextLedger {
    pub fn new(backend: Backend) -> Self {
        ContextLedger {
            backend,
            entries: BTreeMap::new(),
        }
    }

    /// Record every state field a step declares or references. Method
    /// calls on the state object and fields the skeleton provides are not
    /// recorded. Returns the names that were new.
    pub fn observe(&mut self, metadata: &StepMetadata, scenario: &str) -> Vec<String> {
        let pattern = match self.backend {
            Backend::Behave => &*BEHAVE_STATE,
            Backend::Godog => &*GODOG_STATE,
            Backend::Cucumber => &*CUCUMBER_STATE,
        };
        let builtin = self.backend.builtin_state_fields();

        let declared = metadata.fields().iter().map(|f| f.name.clone());
        let referenced = pattern
            .captures_iter(metadata.logic())
            .filter(|caps| caps.get(2).is_none())
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()));

        let mut added = Vec::new();
        for name in declared.chain(referenced) {
            if builtin.contains(&name.as_str()) || self.entries.contains_key(&name) {
                continue;
            }
            self.entries.insert(
                name.clone(),
                Provenance {
                    step: metadata.identifier().clone(),
                    step_text: metadata.step().source.clone(),
                    scenario: scenario.to_string(),
                },
            );
            added.push(name);
        }
        added
    }

    pub fn get(&self, name: &str) -> Option<&Provenance> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Provenance)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// One line per known field, for inclusion in oracle requests.
    pub fn describe(&self) -> Vec<String> {
        let prefix = self.backend.state_prefix();
        self.entries
            .iter()
            .map(|(name, p)| format!("{}{} (set by step: {})", prefix, name, p.step_text))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::RoleResolver;
    use crate::sanitize::sanitize;
    use crate::step::extract_step;

    fn metadata(line: &str, raw: &str, backend: Backend) -> StepMetadata {
        let (_, step) = extract_step(line, backend, RoleResolver::new()).unwrap();
        StepMetadata::new(step, sanitize(raw, backend))
    }

    #[test]
    fn records_references_and_skips_builtins_and_methods() {
        let mut ledger = ContextLedger::new(Backend::Behave);
        let m = metadata(
            "Given a value of \"5\"",
            "context.value = int(of)\nport = context.test_config['port']\ncontext.execute_steps('x')",
            Backend::Behave,
        );
        let added = ledger.observe(&m, "Add");
        assert_eq!(added, vec!["value"]);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("value").unwrap().scenario, "Add");
    }

    #[test]
    fn first_writer_keeps_provenance() {
        let mut ledger = ContextLedger::new(Backend::Godog);
        let first = metadata("Given a value", "s.total = 1\nreturn nil", Backend::Godog);
        let second = metadata("When we add", "s.total += 1\nreturn nil", Backend::Godog);
        ledger.observe(&first, "one");
        assert!(ledger.observe(&second, "two").is_empty());
        assert_eq!(ledger.get("total").unwrap().step_text, "Given a value");
    }

    #[test]
    fn declared_fields_are_recorded() {
        let mut ledger = ContextLedger::new(Backend::Godog);
        let m = metadata(
            "When it is called",
            "---CONTEXT-FIELDS---\nstatus int\n---LOGIC---\nreturn nil",
            Backend::Godog,
        );
        ledger.observe(&m, "s");
        assert!(ledger.get("status").is_some());
        assert_eq!(ledger.describe(), vec!["s.status (set by step: When it is called)"]);
    }
}
