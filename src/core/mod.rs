//! Core data model shared by the store, the runner and the service.

pub mod error;
pub mod event;
pub mod submission;
pub mod utils;
pub mod verdict;

pub use error::JudgeError;
pub use event::Event;
pub use submission::{
    CreateSubmissionRequest, Language, Status, Submission, SubmissionId, SubmissionView,
};
pub use verdict::Verdict;
