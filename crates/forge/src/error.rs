use std::path::PathBuf;

use stepsmith_codegen::CodegenError;
use stepsmith_core::StepFormatError;

/// Errors that abort processing of a feature.
///
/// Per-step oracle failures and validator rejections are not errors at
/// this level: the first is a skipped step, the second drives the repair
/// loop and ends up in the outcome.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error(transparent)]
    Step(#[from] StepFormatError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Report(#[from] serde_json::Error),
}

/// A toolchain command could not be run to completion.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("`{program}` not found on PATH")]
    NotFound { program: String },

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to capture output: {0}")]
    Capture(#[source] std::io::Error),
}

/// The test configuration file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config format for {path} (expected .yaml, .yml, .json or .toml)")]
    UnknownFormat { path: PathBuf },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config root must be a mapping")]
    NotAMapping,
}

/// The result record written by "then" logic does not satisfy the
/// extract-then-compare contract. Fails the assertion phase only; the
/// generated project stays valid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResultContractViolation {
    #[error("result record {path} was not created; the Then step likely did not run")]
    MissingRecord { path: PathBuf },

    #[error("result record {path} is not valid JSON: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("result record does not match its schema: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("lookup key '{key}' is not in the config's expected_outputs")]
    UnknownKey { key: String },
}
