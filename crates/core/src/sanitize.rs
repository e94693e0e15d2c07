//! Cleans untrusted oracle responses into a step-function body, its imports
//! and any auxiliary state fields.
//!
//! The rules are fixed and line-based. Running the sanitizer over its own
//! output changes nothing.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::backend::Backend;
use crate::imports::{normalize_section_line, parse_go_spec, parse_import, retain_used, strip_line_comment, ImportDecl};

/// A state field the generated code declares on the shared scenario state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: String,
}

/// The cleaned response for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedResponse {
    pub logic: String,
    pub imports: BTreeSet<String>,
    pub fields: Vec<FieldDecl>,
    /// Cleaning left nothing and the placeholder body was substituted.
    pub degenerate: bool,
}

// ── Fixed patterns ───────────────────────────────────────────────────

static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*---(IMPORTS|CONTEXT-FIELDS|LOGIC)---[ \t]*$").expect("section marker regex")
});

static PROSE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:here(?:'s| is| are)\b.*|sure[,!.].*|certainly[,!.].*|hope this helps.*|let me know if .*|final answer:?\s*)$",
    )
    .expect("prose regex")
});

static PY_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:async\s+)?def\s+\w+\s*\(.*\)\s*(?:->\s*[^:]+)?:\s*$").expect("python signature regex")
});

static PY_DECORATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*@(?:given|when|then|step|and|but)\b.*$").expect("python decorator regex")
});

static GO_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*func\s+(?:\(\s*\w+\s+\*?\w+\s*\)\s*)?\w+\s*\(.*\)\s*(?:error|\([^)]*\))?\s*\{\s*$")
        .expect("go signature regex")
});

static JAVA_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?:public|private|protected|static|final)\s+)*void\s+\w+\s*\(.*\)\s*(?:throws\s+[\w.,\s]+?)?\s*\{?\s*$",
    )
    .expect("java signature regex")
});

static JAVA_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*@(?:Given|When|Then|And|But)\b.*$").expect("java annotation regex")
});

static GO_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([A-Za-z_]\w*)\s+((?:\*|\[\])*(?:map\[[\w.*]+\](?:\*|\[\])*)?(?:[A-Za-z_][\w.]*|interface\{\}))\s*;?$",
    )
    .expect("go field regex")
});

static JAVA_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][\w.]*(?:<[\w\s,.<>?]*>)?(?:\[\])*)\s+([A-Za-z_]\w*)\s*;?$")
        .expect("java field regex")
});

static JAVA_MODIFIERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:public|private|protected|static|final|volatile)\s+)*").expect("java modifier regex")
});

// ── Field declarations ───────────────────────────────────────────────

impl FieldDecl {
    /// Parse a field declaration line in the backend's own syntax: Go
    /// struct fields are `name Type`, Java static fields are `Type name;`.
    /// Behave state is dynamic and has no declarations.
    pub fn parse(line: &str, backend: Backend) -> Option<Self> {
        let line = line.trim();
        match backend {
            Backend::Behave => None,
            Backend::Godog => {
                let caps = GO_FIELD.captures(line)?;
                let name = caps.get(1)?.as_str();
                if backend.is_reserved(name) {
                    return None;
                }
                Some(FieldDecl {
                    name: name.to_string(),
                    ty: caps.get(2)?.as_str().to_string(),
                })
            }
            Backend::Cucumber => {
                let line = JAVA_MODIFIERS.replace(line, "");
                let caps = JAVA_FIELD.captures(&line)?;
                let ty = caps.get(1)?.as_str();
                let name = caps.get(2)?.as_str();
                if (backend.is_reserved(ty) && !is_java_primitive(ty)) || backend.is_reserved(name) {
                    return None;
                }
                Some(FieldDecl {
                    name: name.to_string(),
                    ty: ty.to_string(),
                })
            }
        }
    }

    /// Declaration line as it appears in the assembled unit.
    pub fn render(&self, backend: Backend) -> String {
        match backend {
            Backend::Behave => format!("# {}: {}", self.name, self.ty),
            Backend::Godog => format!("{} {}", self.name, self.ty),
            Backend::Cucumber => format!("public static {} {};", self.ty, self.name),
        }
    }
}

fn is_java_primitive(ty: &str) -> bool {
    matches!(
        ty,
        "boolean" | "byte" | "char" | "double" | "float" | "int" | "long" | "short"
    )
}

// ── Pipeline ─────────────────────────────────────────────────────────

/// Clean a raw oracle response for one step.
pub fn sanitize(raw: &str, backend: Backend) -> SanitizedResponse {
    let text = extract_answer(raw);

    let (body, mut decls, mut fields, sectioned) = match split_sections(&text) {
        Some(sections) => {
            let decls = sections
                .imports
                .lines()
                .filter_map(|line| normalize_section_line(line, backend))
                .collect::<Vec<_>>();
            let fields = sections
                .fields
                .lines()
                .filter_map(|line| FieldDecl::parse(line, backend))
                .collect::<Vec<_>>();
            (sections.logic, decls, fields, true)
        }
        None => (text, Vec::new(), Vec::new(), false),
    };

    let body = strip_prose(&body);
    let body = strip_echoes(&body, backend);
    let body = dedent(&body);
    let (body, found) = extract_imports(&body, backend);
    decls.extend(found);
    let body = if backend.uses_braces() {
        drop_unbalanced_closers(&body, backend)
    } else {
        body
    };
    let body = if backend == Backend::Godog && !sectioned {
        let (body, found) = extract_go_fields(&body);
        fields.extend(found);
        body
    } else {
        body
    };
    let body = dedent(&body);
    let body = body.trim_matches('\n').to_string();

    let degenerate = body.trim().is_empty();
    let logic = if degenerate {
        backend.placeholder_body().to_string()
    } else {
        body
    };

    let mut seen = BTreeSet::new();
    fields.retain(|field| seen.insert(field.name.clone()));

    let mut usage_scope = logic.clone();
    for field in &fields {
        usage_scope.push('\n');
        usage_scope.push_str(&field.ty);
    }
    let imports = retain_used(&decls, &usage_scope, backend);

    SanitizedResponse {
        logic,
        imports,
        fields,
        degenerate,
    }
}

/// The code portion of a whole-file response, used for repairs: fenced
/// contents (or the text after "Final Answer:") with prose lines removed.
pub fn extract_source(raw: &str) -> String {
    strip_prose(&extract_answer(raw)).trim().to_string()
}

/// Keep only the answer: text after a trailing "Final Answer:" marker, and
/// the contents of fenced blocks when the response has any.
fn extract_answer(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    let text = match lower.rfind("final answer:") {
        Some(pos) => &raw[pos + "final answer:".len()..],
        None => raw,
    };

    let mut in_fence = false;
    let mut saw_fence = false;
    let mut fenced = Vec::new();
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            saw_fence = true;
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            fenced.push(line);
        }
    }
    if saw_fence {
        fenced.join("\n")
    } else {
        text.to_string()
    }
}

struct Sections {
    imports: String,
    fields: String,
    logic: String,
}

fn split_sections(text: &str) -> Option<Sections> {
    let markers: Vec<_> = SECTION_MARKER.captures_iter(text).collect();
    if !markers.iter().any(|caps| caps.get(1).is_some_and(|m| m.as_str() == "LOGIC")) {
        return None;
    }
    let mut sections = Sections {
        imports: String::new(),
        fields: String::new(),
        logic: String::new(),
    };
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let content = text[whole.end()..end].trim_matches('\n');
        let slot = match name.as_str() {
            "IMPORTS" => &mut sections.imports,
            "CONTEXT-FIELDS" => &mut sections.fields,
            _ => &mut sections.logic,
        };
        slot.push_str(content);
    }
    Some(sections)
}

fn strip_prose(body: &str) -> String {
    body.lines()
        .filter(|line| !PROSE_LINE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove re-echoed step signatures and binding decorators/annotations.
fn strip_echoes(body: &str, backend: Backend) -> String {
    body.lines()
        .filter(|line| match backend {
            Backend::Behave => !PY_SIGNATURE.is_match(line) && !PY_DECORATOR.is_match(line),
            Backend::Godog => !GO_SIGNATURE.is_match(line),
            Backend::Cucumber => !JAVA_SIGNATURE.is_match(line) && !JAVA_ANNOTATION.is_match(line),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull import declarations out of the body. Python imports count only at
/// the top level of the (dedented) body; Go imports may come as single
/// lines or as `import ( ... )` blocks.
fn extract_imports(body: &str, backend: Backend) -> (String, Vec<ImportDecl>) {
    let mut kept = Vec::new();
    let mut decls = Vec::new();
    let mut in_go_block = false;

    for line in body.lines() {
        let trimmed = line.trim();
        if in_go_block {
            if trimmed == ")" {
                in_go_block = false;
            } else if let Some(decl) = parse_go_spec(strip_line_comment(trimmed, backend)) {
                decls.push(decl);
            }
            continue;
        }
        if backend == Backend::Godog {
            let opener = trimmed
                .strip_prefix("import")
                .and_then(|rest| rest.strip_suffix('('));
            if opener.is_some_and(|inner| inner.trim().is_empty()) {
                in_go_block = true;
                continue;
            }
        }
        let top_level = backend != Backend::Behave || !line.starts_with(char::is_whitespace);
        match parse_import(trimmed, backend) {
            Some(decl) if top_level => decls.push(decl),
            _ => kept.push(line),
        }
    }
    (kept.join("\n"), decls)
}

/// Drop lines made only of closing braces that would take the block depth
/// below zero, which is what an echoed signature leaves behind.
fn drop_unbalanced_closers(body: &str, backend: Backend) -> String {
    let mut depth: usize = 0;
    let mut kept = Vec::new();
    for line in body.lines() {
        let code = strip_line_comment(line, backend);
        let (opens, closes) = count_braces(code);
        let only_closers = {
            let t = code.trim();
            !t.is_empty() && t.starts_with('}') && t.chars().all(|c| matches!(c, '}' | ')' | ';' | ' '))
        };
        if only_closers && closes > depth {
            continue;
        }
        depth = (depth + opens).saturating_sub(closes);
        kept.push(line);
    }
    kept.join("\n")
}

fn count_braces(code: &str) -> (usize, usize) {
    let mut opens = 0;
    let mut closes = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in code.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '{' => opens += 1,
            '}' => closes += 1,
            _ => {}
        }
    }
    (opens, closes)
}

/// Without explicit sections, Go responses sometimes declare the state
/// they need as bare `name Type` lines. Those are not statements; lift them
/// out as scenario-context fields.
fn extract_go_fields(body: &str) -> (String, Vec<FieldDecl>) {
    let mut kept = Vec::new();
    let mut fields = Vec::new();
    for line in body.lines() {
        let top_level = !line.starts_with(char::is_whitespace);
        match FieldDecl::parse(line, Backend::Godog) {
            Some(field) if top_level && !is_go_statement_word(&field.ty) => fields.push(field),
            _ => kept.push(line),
        }
    }
    (kept.join("\n"), fields)
}

fn is_go_statement_word(ty: &str) -> bool {
    matches!(ty, "nil" | "true" | "false" | "err")
}

/// Remove the common leading indentation of all non-blank lines and
/// trailing whitespace of every line. Only ASCII spaces and tabs count as
/// indentation, so the cut always lands on a character boundary.
pub fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line[indent..].trim_end()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
