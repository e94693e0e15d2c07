//! Per-backend import grammar and unused-import elimination.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::backend::Backend;

/// One import declaration accepted by a backend's grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Canonical text. Python and Java keep the full statement; Go keeps the
    /// import spec (`"net/http"` or `alias "path"`) so the assembler can
    /// group specs into one import block.
    pub text: String,
    /// Names the declaration brings into scope.
    pub symbols: Vec<String>,
    /// Wildcard, blank and dot imports cannot be checked for usage.
    pub always_used: bool,
}

static PY_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^import\s+([A-Za-z_][\w.]*(?:\s+as\s+[A-Za-z_]\w*)?(?:\s*,\s*[A-Za-z_][\w.]*(?:\s+as\s+[A-Za-z_]\w*)?)*)\s*$",
    )
    .expect("python import regex")
});

static PY_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^from\s+(\.*[A-Za-z_][\w.]*|\.+)\s+import\s+(\*|\(?\s*[A-Za-z_]\w*(?:\s+as\s+[A-Za-z_]\w*)?(?:\s*,\s*[A-Za-z_]\w*(?:\s+as\s+[A-Za-z_]\w*)?)*\s*,?\s*\)?)\s*$",
    )
    .expect("python from-import regex")
});

static GO_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:([A-Za-z_]\w*|\.)\s+)?"([A-Za-z0-9_.~/\-]+)"\s*;?$"#).expect("go import spec regex")
});

static JAVA_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^import\s+(static\s+)?([A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)(\.\*)?\s*;?\s*$")
        .expect("java import regex")
});

static GO_MAJOR_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v\d+$").expect("go major version regex"));

/// Parse a single trimmed line against the backend's import grammar.
///
/// Go block openers (`import (`) are not declarations; the sanitizer
/// handles blocks and feeds their inner lines to [`parse_go_spec`].
pub fn parse_import(line: &str, backend: Backend) -> Option<ImportDecl> {
    let line = line.trim();
    match backend {
        Backend::Behave => parse_python(line),
        Backend::Godog => {
            let spec = line.strip_prefix("import")?;
            if !spec.starts_with(char::is_whitespace) {
                return None;
            }
            parse_go_spec(spec.trim())
        }
        Backend::Cucumber => parse_java(line),
    }
}

/// Parse one Go import spec: `"path"`, `alias "path"`, `_ "path"` or
/// `. "path"`.
pub fn parse_go_spec(spec: &str) -> Option<ImportDecl> {
    let caps = GO_SPEC.captures(spec.trim())?;
    let path = caps.get(2)?.as_str();
    let alias = caps.get(1).map(|m| m.as_str());
    let text = match alias {
        Some(alias) => format!("{} \"{}\"", alias, path),
        None => format!("\"{}\"", path),
    };
    // Blank and dot imports bind nothing checkable. A path whose package
    // name cannot be guessed is kept as well.
    let symbol = match alias {
        Some("_") | Some(".") => None,
        Some(alias) => Some(alias.to_string()),
        None => go_package_name(path),
    };
    Some(ImportDecl {
        text,
        always_used: symbol.is_none(),
        symbols: symbol.into_iter().collect(),
    })
}

/// Normalize a line from an `---IMPORTS---` section into the backend's
/// grammar. Accepts bare forms the oracle tends to emit (`"fmt"`, `fmt`,
/// `java.util.List`).
pub fn normalize_section_line(line: &str, backend: Backend) -> Option<ImportDecl> {
    let line = line.trim().trim_end_matches(',');
    if line.is_empty() {
        return None;
    }
    if let Some(decl) = parse_import(line, backend) {
        return Some(decl);
    }
    match backend {
        Backend::Behave => None,
        Backend::Godog => parse_go_spec(line).or_else(|| parse_go_spec(&format!("\"{}\"", line))),
        Backend::Cucumber => parse_java(&format!("import {}", line)),
    }
}

fn parse_python(line: &str) -> Option<ImportDecl> {
    if let Some(caps) = PY_IMPORT.captures(line) {
        let names = caps.get(1)?.as_str();
        let symbols = names
            .split(',')
            .filter_map(|item| {
                let mut parts = item.split_whitespace();
                let module = parts.next()?;
                match (parts.next(), parts.next()) {
                    (Some("as"), Some(alias)) => Some(alias.to_string()),
                    _ => module.split('.').next().map(str::to_string),
                }
            })
            .collect();
        return Some(ImportDecl {
            text: collapse_whitespace(line),
            symbols,
            always_used: false,
        });
    }
    let caps = PY_FROM.captures(line)?;
    let names = caps.get(2)?.as_str();
    if names == "*" {
        return Some(ImportDecl {
            text: collapse_whitespace(line),
            symbols: Vec::new(),
            always_used: true,
        });
    }
    let symbols = names
        .trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .filter_map(|item| item.split_whitespace().last().map(str::to_string))
        .collect();
    Some(ImportDecl {
        text: collapse_whitespace(line),
        symbols,
        always_used: false,
    })
}

fn parse_java(line: &str) -> Option<ImportDecl> {
    let caps = JAVA_IMPORT.captures(line)?;
    let is_static = caps.get(1).is_some();
    let path = caps.get(2)?.as_str();
    let wildcard = caps.get(3).is_some();
    let text = format!(
        "import {}{}{};",
        if is_static { "static " } else { "" },
        path,
        if wildcard { ".*" } else { "" }
    );
    let symbols = if wildcard {
        Vec::new()
    } else {
        path.rsplit('.').next().map(str::to_string).into_iter().collect()
    };
    Some(ImportDecl {
        text,
        symbols,
        always_used: wildcard,
    })
}

/// The identifier a Go import path binds when no alias is given.
fn go_package_name(path: &str) -> Option<String> {
    let mut segments = path.rsplit('/');
    let mut last = segments.next()?;
    if GO_MAJOR_VERSION.is_match(last) {
        last = segments.next()?;
    }
    // gopkg.in/yaml.v3 -> yaml
    let last = match last.rsplit_once('.') {
        Some((head, tail)) if GO_MAJOR_VERSION.is_match(tail) => head,
        _ => last,
    };
    // github.com/redis/go-redis -> redis
    let last = last.rsplit('-').next().unwrap_or(last);
    let valid = last
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && last.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then(|| last.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep only declarations whose symbols appear as whole-word tokens in the
/// code. Comments are ignored so a symbol mentioned only in a comment does
/// not keep its import alive.
pub fn retain_used(decls: &[ImportDecl], code: &str, backend: Backend) -> BTreeSet<String> {
    let tokens = code_tokens(code, backend);
    decls
        .iter()
        .filter(|decl| decl.always_used || decl.symbols.iter().any(|s| tokens.contains(s.as_str())))
        .map(|decl| decl.text.clone())
        .collect()
}

fn code_tokens(code: &str, backend: Backend) -> HashSet<&str> {
    let mut tokens = HashSet::new();
    for line in code.lines() {
        let line = strip_line_comment(line, backend);
        for token in line.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$')) {
            if !token.is_empty() {
                tokens.insert(token);
            }
        }
    }
    tokens
}

/// Cut a line at its line comment, ignoring comment markers inside string
/// literals.
pub(crate) fn strip_line_comment(line: &str, backend: Backend) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    for (idx, &(pos, c)) in chars.iter().enumerate() {
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
            '#' if backend == Backend::Behave => return &line[..pos],
            '/' if backend != Backend::Behave => {
                if chars.get(idx + 1).is_some_and(|&(_, next)| next == '/') {
                    return &line[..pos];
                }
            }
            _ => {}
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_grammar() {
        let decl = parse_import("import os.path", Backend::Behave).unwrap();
        assert_eq!(decl.symbols, vec!["os"]);
        let decl = parse_import("import numpy as np, json", Backend::Behave).unwrap();
        assert_eq!(decl.symbols, vec!["np", "json"]);
        let decl = parse_import("from pathlib import Path, PurePath as PP", Backend::Behave).unwrap();
        assert_eq!(decl.symbols, vec!["Path", "PP"]);
        assert!(parse_import("from x import *", Backend::Behave).unwrap().always_used);
        assert!(parse_import("important = 1", Backend::Behave).is_none());
        assert!(parse_import("import", Backend::Behave).is_none());
    }

    #[test]
    fn go_grammar() {
        let decl = parse_import("import \"net/http\"", Backend::Godog).unwrap();
        assert_eq!(decl.text, "\"net/http\"");
        assert_eq!(decl.symbols, vec!["http"]);
        let decl = parse_go_spec("yaml \"gopkg.in/yaml.v3\"").unwrap();
        assert_eq!(decl.symbols, vec!["yaml"]);
        let decl = parse_go_spec("\"gopkg.in/yaml.v3\"").unwrap();
        assert_eq!(decl.symbols, vec!["yaml"]);
        let decl = parse_go_spec("\"github.com/jackc/pgx/v5\"").unwrap();
        assert_eq!(decl.symbols, vec!["pgx"]);
        assert!(parse_go_spec("_ \"github.com/lib/pq\"").unwrap().always_used);
        assert!(parse_import("import (", Backend::Godog).is_none());
        assert!(parse_import("importer := 1", Backend::Godog).is_none());
    }

    #[test]
    fn java_grammar() {
        let decl = parse_import("import java.util.List;", Backend::Cucumber).unwrap();
        assert_eq!(decl.symbols, vec!["List"]);
        let decl = parse_import("import static org.junit.Assert.assertEquals", Backend::Cucumber).unwrap();
        assert_eq!(decl.text, "import static org.junit.Assert.assertEquals;");
        assert_eq!(decl.symbols, vec!["assertEquals"]);
        assert!(parse_import("import java.io.*;", Backend::Cucumber).unwrap().always_used);
        assert!(parse_import("import 1bad;", Backend::Cucumber).is_none());
    }

    #[test]
    fn section_lines_accept_bare_forms() {
        assert_eq!(
            normalize_section_line("fmt", Backend::Godog).unwrap().text,
            "\"fmt\""
        );
        assert_eq!(
            normalize_section_line("\"os/exec\"", Backend::Godog).unwrap().text,
            "\"os/exec\""
        );
        assert_eq!(
            normalize_section_line("java.util.Map", Backend::Cucumber).unwrap().text,
            "import java.util.Map;"
        );
        assert!(normalize_section_line("not an import", Backend::Behave).is_none());
    }

    #[test]
    fn only_used_imports_survive() {
        let decls = vec![
            parse_import("import json", Backend::Behave).unwrap(),
            parse_import("import subprocess", Backend::Behave).unwrap(),
        ];
        let kept = retain_used(&decls, "data = json.loads(raw)\n# subprocess unused", Backend::Behave);
        assert_eq!(kept.into_iter().collect::<Vec<_>>(), vec!["import json"]);
    }

    #[test]
    fn comment_markers_inside_strings_are_code() {
        assert_eq!(
            strip_line_comment("url := \"http://x\" // trailing", Backend::Godog),
            "url := \"http://x\" "
        );
        assert_eq!(strip_line_comment("x = '#'  # note", Backend::Behave), "x = '#'  ");
    }
}
