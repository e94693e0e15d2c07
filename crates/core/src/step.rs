//! Step signature extraction: role, backend match pattern, parameter slots.

use serde::Serialize;

use crate::backend::{Backend, MatcherKind};
use crate::error::StepFormatError;
use crate::feature::FeatureSpec;
use crate::identifier::{StepIdentifier, QUOTED_SPAN};
use crate::keyword::{split_keyword, Keyword, Role, RoleResolver};

/// One named parameter position in a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSlot {
    pub name: String,
    /// The literal written in the feature file. `None` for scenario-outline
    /// placeholders such as `"<amount>"`, which carry no concrete value.
    pub example: Option<String>,
}

/// A step line resolved against one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedStep {
    /// The trimmed step line as written.
    pub source: String,
    pub keyword: Keyword,
    pub role: Role,
    /// Step text after the keyword.
    pub remainder: String,
    pub slots: Vec<ParameterSlot>,
    pub pattern: String,
    pub identifier: StepIdentifier,
}

/// A scenario whose steps have been resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedScenario {
    pub title: String,
    pub text: String,
    pub steps: Vec<ParsedStep>,
}

impl ParsedStep {
    pub fn param_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name.as_str()).collect()
    }

    /// Key under which the backend's step registry would consider two
    /// definitions the same binding. Keyword-scoped matchers include the
    /// role; the others match any keyword against any definition.
    pub fn binding_key(&self, backend: Backend) -> String {
        if backend.keyword_scoped() {
            format!("{} {}", self.role, self.pattern)
        } else {
            self.pattern.clone()
        }
    }
}

/// Extract the signature of one step line.
///
/// Takes the running role resolver by value and returns its next state, so
/// callers fold it across the steps of a feature.
pub fn extract_step(
    line: &str,
    backend: Backend,
    resolver: RoleResolver,
) -> Result<(RoleResolver, ParsedStep), StepFormatError> {
    let source = line.trim();
    let (keyword, remainder) =
        split_keyword(source).ok_or_else(|| StepFormatError::UnrecognizedKeyword {
            line: source.to_string(),
        })?;
    if remainder.is_empty() {
        return Err(StepFormatError::EmptyStep {
            line: source.to_string(),
        });
    }
    let (resolver, role) = resolver.resolve(keyword);
    let (pattern, slots) = render_pattern(remainder, backend);

    let step = ParsedStep {
        source: source.to_string(),
        keyword,
        role,
        remainder: remainder.to_string(),
        slots,
        pattern,
        identifier: StepIdentifier::derive(role, remainder),
    };
    Ok((resolver, step))
}

/// Resolve every step of a feature. The continuation pointer runs across
/// the whole feature, not per scenario.
pub fn parse_feature_steps(
    feature: &FeatureSpec,
    backend: Backend,
) -> Result<Vec<ParsedScenario>, StepFormatError> {
    let mut resolver = RoleResolver::new();
    let mut parsed = Vec::with_capacity(feature.scenarios.len());
    for scenario in &feature.scenarios {
        let mut steps = Vec::with_capacity(scenario.steps.len());
        for line in &scenario.steps {
            let (next, step) = extract_step(line, backend, resolver)?;
            resolver = next;
            steps.push(step);
        }
        parsed.push(ParsedScenario {
            title: scenario.title.clone(),
            text: scenario.text.clone(),
            steps,
        });
    }
    Ok(parsed)
}

/// Build the match pattern and parameter slots for a keyword-stripped step.
pub fn render_pattern(remainder: &str, backend: Backend) -> (String, Vec<ParameterSlot>) {
    let mut pattern = String::new();
    let mut slots: Vec<ParameterSlot> = Vec::new();
    let mut static_so_far = String::new();
    let mut last_end = 0;

    for (i, caps) in QUOTED_SPAN.captures_iter(remainder).enumerate() {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let value = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let static_part = &remainder[last_end..whole.start()];
        static_so_far.push_str(static_part);
        pattern.push_str(&escape_static(static_part, backend));

        let base = match last_identifier_word(&static_so_far) {
            Some(word) => hygienic_name(&word.to_ascii_lowercase(), backend),
            None => format!("param{}", i),
        };
        let name = unique_name(&base, &slots);
        pattern.push_str(&placeholder(&name, backend));

        slots.push(ParameterSlot {
            name,
            example: example_value(value),
        });
        last_end = whole.end();
    }
    pattern.push_str(&escape_static(&remainder[last_end..], backend));

    (pattern.trim().to_string(), slots)
}

fn escape_static(text: &str, backend: Backend) -> String {
    match backend.matcher() {
        MatcherKind::ParseFormat => text.replace('{', "{{").replace('}', "}}"),
        MatcherKind::Regex => regex::escape(text),
        MatcherKind::CucumberExpression => {
            let mut out = String::with_capacity(text.len());
            for c in text.chars() {
                if matches!(c, '\\' | '(' | '{' | '/') {
                    out.push('\\');
                }
                out.push(c);
            }
            out
        }
    }
}

fn placeholder(name: &str, backend: Backend) -> String {
    match backend.matcher() {
        MatcherKind::ParseFormat => format!("\"{{{}}}\"", name),
        MatcherKind::Regex => r#""([^"]*)""#.to_string(),
        MatcherKind::CucumberExpression => "{string}".to_string(),
    }
}

/// The last word of `text` that can serve as an identifier in every
/// backend language (ASCII, starts with a letter or underscore).
fn last_identifier_word(text: &str) -> Option<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .rev()
        .find(|word| {
            word.chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        })
        .map(str::to_string)
}

fn hygienic_name(word: &str, backend: Backend) -> String {
    if backend.is_reserved(word) {
        format!("{}_arg", word)
    } else {
        word.to_string()
    }
}

fn unique_name(base: &str, taken: &[ParameterSlot]) -> String {
    let is_taken = |candidate: &str| taken.iter().any(|slot| slot.name == candidate);
    if !is_taken(base) {
        return base.to_string();
    }
    let mut k = 1;
    loop {
        let candidate = format!("{}{}", base, k);
        if !is_taken(&candidate) {
            return candidate;
        }
        k += 1;
    }
}

fn example_value(value: &str) -> Option<String> {
    let is_outline_placeholder =
        value.len() > 2 && value.starts_with('<') && value.ends_with('>');
    if is_outline_placeholder {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::parse_feature;

    fn extract(line: &str, backend: Backend) -> ParsedStep {
        extract_step(line, backend, RoleResolver::new()).unwrap().1
    }

    #[test]
    fn calculator_steps_have_one_slot_each() {
        let feature = parse_feature(
            "Scenario: add\n  Given a value of \"5\"\n  When we add \"3\"\n  Then the result should be \"8\"\n",
        );
        let scenarios = parse_feature_steps(&feature, Backend::Behave).unwrap();
        let steps = &scenarios[0].steps;
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.slots.len() == 1));
        assert_eq!(steps[0].slots[0].name, "of");
        assert_eq!(steps[1].slots[0].name, "add");
        assert_eq!(steps[2].slots[0].name, "be");
        assert_eq!(steps[2].slots[0].example.as_deref(), Some("8"));
        let mut ids: Vec<_> = steps.iter().map(|s| s.identifier.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn behave_pattern_uses_named_fields() {
        let step = extract("Given a value of \"5\"", Backend::Behave);
        assert_eq!(step.pattern, "a value of \"{of}\"");
    }

    #[test]
    fn godog_pattern_escapes_static_text() {
        let step = extract("When I call \"GET\" on /api/v1 (twice)", Backend::Godog);
        assert_eq!(
            step.pattern,
            r#"I call "([^"]*)" on /api/v1 \(twice\)"#
        );
        assert_eq!(step.slots[0].name, "call");
    }

    #[test]
    fn cucumber_pattern_uses_string_parameter_type() {
        let step = extract("Then the path \"a\" maps to /b (c)", Backend::Cucumber);
        assert_eq!(step.pattern, r"the path {string} maps to \/b \(c)");
    }

    #[test]
    fn no_quotes_means_no_slots_and_literal_pattern() {
        let step = extract("Given the service is running", Backend::Godog);
        assert!(step.slots.is_empty());
        assert_eq!(step.pattern, "the service is running");
        let step = extract("Given costs {braces}", Backend::Behave);
        assert_eq!(step.pattern, "costs {{braces}}");
    }

    #[test]
    fn colliding_names_get_counter_suffixes() {
        let step = extract("Given user \"a\" and user \"b\" and user \"c\"", Backend::Behave);
        assert_eq!(step.param_names(), vec!["user", "user1", "user2"]);
    }

    #[test]
    fn leading_span_uses_positional_fallback() {
        let step = extract("Given \"x\" is set", Backend::Godog);
        assert_eq!(step.param_names(), vec!["param0"]);
    }

    #[test]
    fn numeric_words_are_not_names() {
        let step = extract("When 42 \"x\"", Backend::Cucumber);
        assert_eq!(step.param_names(), vec!["param0"]);
    }

    #[test]
    fn reserved_words_are_suffixed() {
        let step = extract("Given a context \"x\"", Backend::Behave);
        assert_eq!(step.param_names(), vec!["context_arg"]);
        let step = extract("Given class \"x\" and import \"y\"", Backend::Cucumber);
        assert_eq!(step.param_names(), vec!["class_arg", "import_arg"]);
    }

    #[test]
    fn outline_placeholders_have_no_example() {
        let step = extract("Given amount \"<amount>\"", Backend::Behave);
        assert_eq!(step.slots[0].example, None);
    }

    #[test]
    fn continuation_pointer_spans_scenarios() {
        let feature = parse_feature(
            "Scenario: one\n  When it runs\nScenario: two\n  And it keeps running\n",
        );
        let scenarios = parse_feature_steps(&feature, Backend::Godog).unwrap();
        assert_eq!(scenarios[1].steps[0].role, Role::When);
    }

    #[test]
    fn bare_keyword_lines_never_reach_the_extractor() {
        let feature = parse_feature("Scenario: s\n  Given a thing\n  And\n  Then it works\n");
        assert_eq!(feature.scenarios[0].steps, vec!["Given a thing", "Then it works"]);
        let scenarios = parse_feature_steps(&feature, Backend::Behave).unwrap();
        assert_eq!(scenarios[0].steps.len(), 2);
    }

    #[test]
    fn unrecognized_keyword_is_an_error() {
        let err = extract_step("Whenever it rains", Backend::Behave, RoleResolver::new()).unwrap_err();
        assert!(matches!(err, StepFormatError::UnrecognizedKeyword { .. }));
    }

    #[test]
    fn binding_key_respects_keyword_scoping() {
        let given = extract("Given a value of \"5\"", Backend::Godog);
        let then = extract("Then a value of \"6\"", Backend::Godog);
        assert_eq!(given.binding_key(Backend::Godog), then.binding_key(Backend::Godog));
        let given = extract("Given a value of \"5\"", Backend::Behave);
        let then = extract("Then a value of \"6\"", Backend::Behave);
        assert_ne!(given.binding_key(Backend::Behave), then.binding_key(Backend::Behave));
    }
}
