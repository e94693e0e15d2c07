//! stepsmith-forge: turns a feature into a validated project.
//!
//! [`Forge`] runs the per-feature pipeline: steps are synthesized strictly
//! in written order, assembled into one unit, then passed through the
//! bounded [`RepairLoop`] until a [`Validator`] accepts the unit or the
//! repair budget runs out. [`runner`] executes a written project and
//! compares its result record with the configuration's expected outputs.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod repair;
pub mod report;
pub mod runner;
pub mod toolchain;
pub mod validate;

pub use config::{ConfigFormat, TestConfig};
pub use error::{ConfigError, ForgeError, ResultContractViolation, ToolchainError};
pub use pipeline::{Forge, ForgeOutcome, ForgeSettings, SkippedStep, StepRecord, Synthesized};
pub use repair::{RepairContext, RepairLoop, RepairOutcome, RepairState, DEFAULT_MAX_REPAIRS};
pub use report::{write_outputs, RunReport, WrittenProject, REPORT_FILE};
pub use runner::{check_record, run_project, Assertion, RunOutcome};
pub use toolchain::{run_with_timeout, ProcessOutcome, DEFAULT_TIMEOUT};
pub use validate::{
    ProjectSource, ToolchainValidator, ValidationVerdict, Validator, VerdictStatus,
};
