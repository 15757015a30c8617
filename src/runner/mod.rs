//! Runner module - Execution abstraction layer
//!
//! A runner performs the two isolated steps of a submission:
//! - `compile`: build step for compiled languages
//! - `run`: execute the program against the submission's stdin
//!
//! `SandboxedRunner` is the production implementation (one container per
//! step). Tests inject a scripted fake instead.
//!
//! The runner module does NOT:
//! - Compare outputs or determine verdicts
//! - Touch the submission store

pub mod sandboxed;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::{Language, Submission};

pub use sandboxed::SandboxedRunner;

/// Outcome of the run step
///
/// A non-zero exit or a timeout is data for the verdict classifier, not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResult {
    /// Captured stdout, truncated to the submission's output cap
    pub stdout: String,
    /// Captured stderr, truncated to a fixed ceiling
    pub stderr: String,
    /// Process exit code (sentinel value if timed out)
    pub exit_code: i32,
    /// Deadline exceeded
    pub timed_out: bool,
    /// Wall-clock time in milliseconds
    pub runtime_ms: u64,
    /// Always 0: memory is not metered
    pub memory_kb: u64,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(Language),

    #[error("compilation failed")]
    CompileFailed { log: String },

    /// `log` holds whatever the compiler printed before the deadline
    #[error("compile timeout after {limit_ms}ms")]
    CompileTimeout { limit_ms: u64, log: String },

    #[error("sandbox failure: {0}")]
    Sandbox(String),
}

impl RunnerError {
    /// Diagnostic text to retain in the submission's logs
    pub fn log(&self) -> String {
        match self {
            RunnerError::CompileFailed { log } if !log.trim().is_empty() => log.clone(),
            RunnerError::CompileTimeout { log, .. } if !log.trim().is_empty() => {
                format!("{}\n{}", self, log.trim_end())
            }
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for RunnerError {
    fn from(e: anyhow::Error) -> Self {
        RunnerError::Sandbox(format!("{:#}", e))
    }
}

/// Runner trait for compiling and executing one submission
#[async_trait]
pub trait Runner: Send + Sync {
    /// Build step. Returns the compiler's diagnostic output on success.
    async fn compile(&self, submission: &Submission) -> Result<String, RunnerError>;

    /// Run step against the submission's stdin
    async fn run(&self, submission: &Submission) -> Result<RunResult, RunnerError>;
}
