//! Running external toolchain commands under a wall-clock timeout.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::ToolchainError;

/// Default bound on one toolchain command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a finished (or killed) command went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub elapsed_ms: u64,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Stdout followed by stderr.
    pub fn output(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// Run `program args..` in `cwd`, killing it once `timeout` has passed.
///
/// Output goes to temporary files rather than pipes so a chatty build
/// cannot stall on a full pipe while nobody is reading.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
) -> Result<ProcessOutcome, ToolchainError> {
    let mut stdout_file = tempfile::tempfile().map_err(ToolchainError::Capture)?;
    let mut stderr_file = tempfile::tempfile().map_err(ToolchainError::Capture)?;

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file.try_clone().map_err(ToolchainError::Capture)?))
        .stderr(Stdio::from(stderr_file.try_clone().map_err(ToolchainError::Capture)?))
        .spawn()
        .map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ToolchainError::NotFound {
                    program: program.to_string(),
                }
            } else {
                ToolchainError::Spawn {
                    program: program.to_string(),
                    source,
                }
            }
        })?;

    tracing::debug!(program, ?args, cwd = %cwd.display(), "running toolchain command");

    let started_at = Instant::now();
    let wait_error = |source| ToolchainError::Wait {
        program: program.to_string(),
        source,
    };
    let (status, timed_out) = loop {
        match child.try_wait().map_err(wait_error)? {
            Some(status) => break (status, false),
            None if started_at.elapsed() >= timeout => {
                let _ = child.kill();
                let status = child.wait().map_err(wait_error)?;
                break (status, true);
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    let outcome = ProcessOutcome {
        exit_code: status.code(),
        timed_out,
        elapsed_ms: u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
        stdout: read_back(&mut stdout_file)?,
        stderr: read_back(&mut stderr_file)?,
    };
    if timed_out {
        tracing::warn!(program, timeout_secs = timeout.as_secs(), "toolchain command timed out");
    }
    Ok(outcome)
}

fn read_back(file: &mut std::fs::File) -> Result<String, ToolchainError> {
    let mut bytes = Vec::new();
    file.seek(SeekFrom::Start(0)).map_err(ToolchainError::Capture)?;
    file.read_to_end(&mut bytes).map_err(ToolchainError::Capture)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
