//! Content-addressed function names for steps.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::keyword::Role;

/// Number of hex characters of the content hash appended to the slug.
pub const HASH_WIDTH: usize = 8;

/// Upper bound on the slug part so generated names stay readable.
const MAX_SLUG_LEN: usize = 60;

/// A stable function name derived from a step's normalized text.
///
/// Two steps with the same role and the same remainder (modulo whitespace)
/// always get the same identifier, wherever they appear in the feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepIdentifier(String);

impl StepIdentifier {
    /// Derive the identifier for a step with the given resolved role and
    /// keyword-stripped remainder.
    pub fn derive(role: Role, remainder: &str) -> Self {
        let normalized = normalize(role, remainder);
        let slug = slug(&normalized);
        let hash = content_hash(&normalized);
        StepIdentifier(format!("{}_{}", slug, &hash[..HASH_WIDTH]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StepIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Keyword-normalized step text: resolved role plus the remainder with
/// whitespace runs collapsed.
pub fn normalize(role: Role, remainder: &str) -> String {
    let words: Vec<&str> = remainder.split_whitespace().collect();
    format!("{} {}", role.as_str(), words.join(" "))
}

fn slug(normalized: &str) -> String {
    let without_literals = QUOTED_SPAN.replace_all(normalized, " ");
    let mut slug = String::with_capacity(without_literals.len());
    let mut last_was_sep = true;
    for c in without_literals.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    let mut slug = slug.trim_matches('_').to_string();
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('_').to_string();
    }
    if slug.is_empty() {
        slug.push_str("step");
    }
    slug
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A double-quoted literal span; group 1 is the value.
pub(crate) static QUOTED_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)""#).expect("quoted span regex"));
