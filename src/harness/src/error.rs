use std::path::PathBuf;

use crate::config::ConfigError;
use crate::version::Version;

/// Boxed error used at the analytics session seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by harness operations.
///
/// Everything except [`HarnessError::Config`] and
/// [`HarnessError::StackStartup`] is a check failure: it fails the stack check
/// that triggered it and the runner moves on to the next one.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `docker compose up -d` failed; no check can pass without the stack.
    #[error("Failed to start Docker Compose: {command} exited with {code}\nstdout: {stdout}\nstderr: {stderr}")]
    StackStartup {
        command: String,
        code: ExitCode,
        stdout: String,
        stderr: String,
    },

    #[error("Command {command} failed with {code}\nstdout: {stdout}\nstderr: {stderr}")]
    Compose {
        command: String,
        code: ExitCode,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to run command {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Empty command line")]
    EmptyCommand,

    #[error("Command {command} returned {actual}, expected {expected}\nstdout: {stdout}\nstderr: {stderr}")]
    UnexpectedExitCode {
        command: String,
        actual: ExitCode,
        expected: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Expected output '{expected}' not found in command output\nstdout: {stdout}\nstderr: {stderr}")]
    MissingOutput {
        expected: String,
        stdout: String,
        stderr: String,
    },

    #[error("Expected pattern '{pattern}' not found in output\nstdout: {stdout}\nstderr: {stderr}")]
    PatternMismatch {
        pattern: String,
        stdout: String,
        stderr: String,
    },

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Executable '{0}' not found in PATH")]
    ExecutableNotFound(String),

    #[error("{script} failed with exit code {code}\nstdout: {stdout}\nstderr: {stderr}")]
    ScriptFailed {
        script: String,
        code: ExitCode,
        stdout: String,
        stderr: String,
    },

    #[error("{script} not found in {}", .dir.display())]
    ScriptNotFound { script: String, dir: PathBuf },

    #[error("Could not parse version from '{executable} {flag}'\nOutput: {output}")]
    UnparseableVersion {
        executable: String,
        flag: String,
        output: String,
    },

    #[error("Invalid minimum version '{0}'")]
    InvalidMinimumVersion(String),

    #[error("'{executable}' version {actual} is less than required {required}")]
    VersionTooOld {
        executable: String,
        actual: Version,
        required: String,
    },

    #[error("HTTP GET {url}: expected status {expected}, got {actual}")]
    HttpStatus {
        url: String,
        expected: u16,
        actual: u16,
    },

    #[error("HTTP request failed for {url}: {source}")]
    HttpTransport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("ClickHouse connection failed: {0}")]
    Connect(#[source] BoxError),

    #[error("ClickHouse query failed. SQL: '{sql}', Error: {source}")]
    Query {
        sql: String,
        #[source]
        source: BoxError,
    },

    #[error("ClickHouse DDL failed. SQL: '{sql}', Error: {source}")]
    Ddl {
        sql: String,
        #[source]
        source: BoxError,
    },

    /// A plain assertion inside a stack check.
    #[error("Check failed: {0}")]
    Check(String),
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

/// Exit status of a child process. `None` means it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub Option<i32>);

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(code) => write!(f, "{code}"),
            None => write!(f, "signal"),
        }
    }
}

/// Fails with [`HarnessError::Check`] unless `condition` holds.
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(HarnessError::Check(message()))
    }
}
