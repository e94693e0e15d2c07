//! The closed set of target language / test-harness combinations.
//!
//! Every backend-specific decision in the pipeline (import grammar,
//! placeholder bodies, step-pattern rendering, reserved identifiers)
//! dispatches on [`Backend`] rather than on framework name strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A supported target backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Python step definitions for Behave.
    Behave,
    /// Go step definitions for Godog.
    Godog,
    /// Java step definitions for Cucumber-JVM (Maven project).
    Cucumber,
}

/// How a backend binds step text to a step function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    /// `parse`-style format strings (`"{name}"` placeholders, braces doubled).
    ParseFormat,
    /// Anchored regular expressions with capturing groups.
    Regex,
    /// Cucumber expressions (`{string}` placeholders).
    CucumberExpression,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Behave, Backend::Godog, Backend::Cucumber];

    pub fn name(self) -> &'static str {
        match self {
            Backend::Behave => "behave",
            Backend::Godog => "godog",
            Backend::Cucumber => "cucumber",
        }
    }

    /// Host language of the generated source.
    pub fn language(self) -> &'static str {
        match self {
            Backend::Behave => "python",
            Backend::Godog => "go",
            Backend::Cucumber => "java",
        }
    }

    /// Interpreted backends only have a parse stage before execution, so
    /// validation must also instrument a real test run.
    pub fn is_interpreted(self) -> bool {
        matches!(self, Backend::Behave)
    }

    pub fn matcher(self) -> MatcherKind {
        match self {
            Backend::Behave => MatcherKind::ParseFormat,
            Backend::Godog => MatcherKind::Regex,
            Backend::Cucumber => MatcherKind::CucumberExpression,
        }
    }

    /// Whether step matching is scoped by keyword. Behave keeps separate
    /// registries for given/when/then; Godog and Cucumber match any keyword
    /// against any definition.
    pub fn keyword_scoped(self) -> bool {
        matches!(self, Backend::Behave)
    }

    /// A body that is always valid inside the generated step function.
    pub fn placeholder_body(self) -> &'static str {
        match self {
            Backend::Behave => "pass",
            Backend::Godog => "return godog.ErrPending",
            Backend::Cucumber => "throw new io.cucumber.java.PendingException();",
        }
    }

    /// Expression prefix generated code uses to reach shared scenario state.
    pub fn state_prefix(self) -> &'static str {
        match self {
            Backend::Behave => "context.",
            Backend::Godog => "s.",
            Backend::Cucumber => "StepDefinitions.",
        }
    }

    /// State fields the skeleton already provides.
    pub fn builtin_state_fields(self) -> &'static [&'static str] {
        match self {
            Backend::Behave => &["test_config"],
            Backend::Godog => &["config"],
            Backend::Cucumber => &["testConfig", "lastCommandOutput", "lastResponseStatusCode"],
        }
    }

    /// Identifiers a generated parameter name must not shadow: language
    /// keywords plus the names the skeleton's signatures already bind.
    pub fn reserved_identifiers(self) -> &'static [&'static str] {
        match self {
            Backend::Behave => PYTHON_RESERVED,
            Backend::Godog => GO_RESERVED,
            Backend::Cucumber => JAVA_RESERVED,
        }
    }

    pub fn is_reserved(self, ident: &str) -> bool {
        self.reserved_identifiers().contains(&ident)
    }

    /// Where generated "then" logic writes its result record, relative to
    /// the project root.
    pub fn result_record_path(self) -> &'static str {
        match self {
            Backend::Behave | Backend::Godog => "test_result.json",
            Backend::Cucumber => "target/test_result.json",
        }
    }

    /// Whether blocks are delimited by braces (and so stray `}` lines can be
    /// detected by balance).
    pub fn uses_braces(self) -> bool {
        !matches!(self, Backend::Behave)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "behave" | "python" => Ok(Backend::Behave),
            "godog" | "go" => Ok(Backend::Godog),
            "cucumber" | "java" => Ok(Backend::Cucumber),
            other => Err(format!(
                "unsupported backend '{}': expected behave, godog or cucumber",
                other
            )),
        }
    }
}

const PYTHON_RESERVED: &[&str] = &[
    "context", "and", "as", "assert", "async", "await", "break", "class", "continue", "def",
    "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in",
    "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with",
    "yield",
];

const GO_RESERVED: &[&str] = &[
    "s", "ctx", "break", "case", "chan", "const", "continue", "default", "defer", "else",
    "fallthrough", "for", "func", "go", "goto", "if", "import", "interface", "map", "package",
    "range", "return", "select", "struct", "switch", "type", "var", "string", "error", "nil",
    "true", "false",
];

const JAVA_RESERVED: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class",
    "const", "continue", "default", "do", "double", "else", "enum", "extends", "final",
    "finally", "float", "for", "goto", "if", "implements", "import", "instanceof", "int",
    "interface", "long", "native", "new", "package", "private", "protected", "public",
    "return", "short", "static", "strictfp", "super", "switch", "synchronized", "this",
    "throw", "throws", "transient", "try", "void", "volatile", "while", "true", "false",
    "null", "var", "record", "yield",
];
