use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::submission::{Status, Submission, SubmissionId};
use super::verdict::Verdict;

/// Immutable snapshot published once per store update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub submission_id: SubmissionId,
    pub status: Status,
    pub verdict: Verdict,
    pub runtime_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Event {
    pub fn from_submission(submission: &Submission) -> Self {
        let message = if submission.status.is_terminal() {
            Some(submission.verdict.description().to_string())
        } else {
            None
        };

        Self {
            submission_id: submission.id.clone(),
            status: submission.status,
            verdict: submission.verdict,
            runtime_ms: submission.runtime_ms,
            timestamp: submission.updated_at,
            message,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
