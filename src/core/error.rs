use thiserror::Error;

use super::submission::SubmissionId;

/// Errors surfaced synchronously to callers of the judge service
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("source code must not be empty")]
    EmptySource,

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("submission not found: {0}")]
    NotFound(SubmissionId),

    #[error("job queue is closed")]
    QueueClosed,

    #[error("worker pool already started")]
    WorkersAlreadyStarted,
}

impl JudgeError {
    /// Request was rejected before a submission was created
    pub fn is_validation(&self) -> bool {
        matches!(self, JudgeError::EmptySource | JudgeError::UnsupportedLanguage(_))
    }
}
