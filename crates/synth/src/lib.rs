//! stepsmith-synth: the synthesis oracle boundary.
//!
//! The rest of the workspace talks to code synthesis only through the
//! [`SynthesisOracle`] trait. This crate provides the request types, prompt
//! construction, a blocking HTTP client, pacing, and record/replay oracles.

pub mod client;
pub mod error;
pub mod oracle;
pub mod pacing;
pub mod prompt;
pub mod replay;

pub use client::{ChatClient, ClientConfig, Provider};
pub use error::OracleError;
pub use oracle::{PendingOracle, RepairRequest, SynthesisBundle, SynthesisOracle};
pub use pacing::{PacedOracle, Pacing, TokenBucket};
pub use replay::{Recording, RecordingOracle, ReplayOracle};
