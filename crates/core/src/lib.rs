//! stepsmith-core: feature parsing and step modelling.
//!
//! Turns feature text into ordered scenarios of parsed steps (role, match
//! pattern, parameter slots, identifier) for one target backend, and turns
//! untrusted oracle responses into frozen [`StepMetadata`].
//!
//! # Public API
//!
//! - [`parse_feature()`] -- split feature text into scenarios
//! - [`parse_feature_steps()`] -- resolve every step against a [`Backend`]
//! - [`sanitize()`] -- clean an oracle response
//! - [`ContextLedger`] -- cross-step state-field knowledge
//! - [`StepFormatError`] -- the only error this crate raises

pub mod backend;
pub mod error;
pub mod feature;
pub mod identifier;
pub mod imports;
pub mod keyword;
pub mod ledger;
pub mod metadata;
pub mod sanitize;
pub mod step;

// ── Convenience re-exports ───────────────────────────────────────────

pub use backend::{Backend, MatcherKind};
pub use error::StepFormatError;
pub use feature::{parse_feature, FeatureSpec, Scenario};
pub use identifier::StepIdentifier;
pub use keyword::{Keyword, Role, RoleResolver};
pub use ledger::{ContextLedger, Provenance};
pub use metadata::StepMetadata;
pub use sanitize::{extract_source, sanitize, FieldDecl, SanitizedResponse};
pub use step::{extract_step, parse_feature_steps, ParameterSlot, ParsedScenario, ParsedStep};
