//! Step keyword grammar shared by the feature parser and the signature
//! extractor, so a line accepted as a step always has a recognizable keyword.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A leading step keyword as written in the feature file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Keyword {
    Given,
    When,
    Then,
    And,
    But,
}

/// The normalized role of a step once continuation keywords are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Given,
    When,
    Then,
}

const KEYWORDS: [(&str, Keyword); 5] = [
    ("given", Keyword::Given),
    ("when", Keyword::When),
    ("then", Keyword::Then),
    ("and", Keyword::And),
    ("but", Keyword::But),
];

impl Keyword {
    /// The primary role this keyword names, or `None` for `And`/`But`.
    pub fn primary_role(self) -> Option<Role> {
        match self {
            Keyword::Given => Some(Role::Given),
            Keyword::When => Some(Role::When),
            Keyword::Then => Some(Role::Then),
            Keyword::And | Keyword::But => None,
        }
    }
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Given => "given",
            Role::When => "when",
            Role::Then => "then",
        }
    }

    /// Capitalized form used by annotation-based backends (`@Given`).
    pub fn title_case(self) -> &'static str {
        match self {
            Role::Given => "Given",
            Role::When => "When",
            Role::Then => "Then",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a trimmed step line into its keyword and the remaining text.
///
/// Matching is case-insensitive and requires a word boundary after the
/// keyword, so "Andrew logs in" is not a step line.
pub fn split_keyword(line: &str) -> Option<(Keyword, &str)> {
    let line = line.trim();
    for (word, keyword) in KEYWORDS {
        let Some(head) = line.get(..word.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(word) {
            continue;
        }
        let rest = &line[word.len()..];
        match rest.chars().next() {
            None => return Some((keyword, "")),
            Some(c) if c.is_alphanumeric() || c == '_' => continue,
            Some(_) => return Some((keyword, rest.trim())),
        }
    }
    None
}

/// Whether a trimmed line opens a scenario or scenario outline.
///
/// Returns the header title (text after the colon) when it does.
pub fn scenario_header(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    for prefix in ["scenario outline:", "scenario:"] {
        if let Some(head) = trimmed.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return Some(trimmed[prefix.len()..].trim());
            }
        }
    }
    None
}

/// Whether a trimmed line opens the feature.
pub fn feature_header(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let prefix = "feature:";
    let head = trimmed.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(trimmed[prefix.len()..].trim())
    } else {
        None
    }
}

/// Whether a line is a step line: starts with a recognized keyword, has
/// text after it, and is not a header. A bare keyword is not a step.
pub fn is_step_line(line: &str) -> bool {
    scenario_header(line).is_none()
        && feature_header(line).is_none()
        && split_keyword(line).is_some_and(|(_, rest)| !rest.is_empty())
}

/// Running pointer that resolves continuation keywords to the nearest
/// preceding primary role. Only primary keywords move the pointer.
///
/// A continuation with no primary before it resolves to `then`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleResolver {
    last_primary: Option<Role>,
}

impl RoleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve one keyword, returning the next resolver state and the role.
    pub fn resolve(self, keyword: Keyword) -> (Self, Role) {
        match keyword.primary_role() {
            Some(role) => (
                RoleResolver {
                    last_primary: Some(role),
                },
                role,
            ),
            None => (self, self.last_primary.unwrap_or(Role::Then)),
        }
    }
}

/// Resolve the roles of a sequence of keywords as a single fold.
pub fn resolve_roles(keywords: &[Keyword]) -> Vec<Role> {
    keywords
        .iter()
        .scan(RoleResolver::new(), |state, &keyword| {
            let (next, role) = state.resolve(keyword);
            *state = next;
            Some(role)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keyword_is_case_insensitive() {
        assert_eq!(
            split_keyword("GIVEN a value of \"5\""),
            Some((Keyword::Given, "a value of \"5\""))
        );
        assert_eq!(split_keyword("  but not this"), Some((Keyword::But, "not this")));
    }

    #[test]
    fn split_keyword_requires_word_boundary() {
        assert_eq!(split_keyword("Andrew logs in"), None);
        assert_eq!(split_keyword("Thenceforth"), None);
        assert_eq!(split_keyword("And"), Some((Keyword::And, "")));
    }

    #[test]
    fn headers_are_not_step_lines() {
        assert!(scenario_header("Scenario: Add").is_some());
        assert!(scenario_header("  scenario outline: Many").is_some());
        assert_eq!(scenario_header("Scenario Outline: Many"), Some("Many"));
        assert!(!is_step_line("Scenario: Given things"));
        assert!(!is_step_line("Feature: When it rains"));
        assert!(is_step_line("When it rains"));
    }

    #[test]
    fn bare_keywords_are_not_step_lines() {
        assert!(!is_step_line("And"));
        assert!(!is_step_line("  Given   "));
        assert!(is_step_line("And more"));
    }

    #[test]
    fn continuations_follow_last_primary_keyword() {
        let roles = resolve_roles(&[
            Keyword::Given,
            Keyword::And,
            Keyword::When,
            Keyword::But,
            Keyword::Then,
            Keyword::And,
        ]);
        assert_eq!(
            roles,
            vec![
                Role::Given,
                Role::Given,
                Role::When,
                Role::When,
                Role::Then,
                Role::Then
            ]
        );
    }

    #[test]
    fn leading_continuation_defaults_to_then() {
        assert_eq!(resolve_roles(&[Keyword::And]), vec![Role::Then]);
    }
}
