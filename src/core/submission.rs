//! Submission model
//!
//! A submission carries immutable inputs (language, source, stdin, expected
//! output, limits) and mutable execution state that only the worker owning the
//! submission writes, always through `SubmissionStore::update`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::JudgeError;
use super::verdict::Verdict;

/// Default time limit in milliseconds
pub const DEFAULT_TIME_LIMIT_MS: u32 = 2000;
/// Default memory limit in MB
pub const DEFAULT_MEMORY_LIMIT_MB: u32 = 256;
/// Default cap on captured stdout (128 KiB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 128 * 1024;

/// Opaque submission identifier (UUID v4 string)
pub type SubmissionId = String;

/// Supported languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "cpp17")]
    Cpp17,
    #[serde(rename = "python311")]
    Python311,
    #[serde(rename = "java17")]
    Java17,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Cpp17, Language::Python311, Language::Java17];

    /// Canonical name, also the key of the language table
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Cpp17 => "cpp17",
            Language::Python311 => "python311",
            Language::Java17 => "java17",
        }
    }

    /// Whether a build step runs before execution
    pub fn requires_compile(&self) -> bool {
        !matches!(self, Language::Python311)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = JudgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpp17" | "cpp" | "c++" | "c++17" => Ok(Language::Cpp17),
            "python311" | "python" | "python3" | "py" => Ok(Language::Python311),
            "java17" | "java" => Ok(Language::Java17),
            _ => Err(JudgeError::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Submission lifecycle
///
/// `queued -> compiling -> running -> done` for compiled languages,
/// `queued -> running -> done` for interpreted ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Queued,
    Compiling,
    Running,
    Done,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Done)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Queued => "queued",
            Status::Compiling => "compiling",
            Status::Running => "running",
            Status::Done => "done",
        };
        f.write_str(s)
    }
}

/// Request accepted by `JudgeService::submit`
///
/// Limits left unset (or zero) fall back to the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateSubmissionRequest {
    pub language: String,
    pub source_code: String,
    pub stdin: String,
    pub expected_output: String,
    pub time_limit_ms: Option<u32>,
    pub memory_limit_mb: Option<u32>,
    pub max_output_bytes: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,

    // Inputs, fixed at creation
    pub language: Language,
    pub source_code: String,
    pub stdin: String,
    pub expected_output: String,
    pub time_limit_ms: u32,
    pub memory_limit_mb: u32,
    pub max_output_bytes: usize,

    // Execution state, written only by the owning worker
    pub status: Status,
    pub verdict: Verdict,
    pub compile_log: String,
    pub runtime_log: String,
    pub output: String,
    pub runtime_ms: u64,
    pub memory_kb: u64,
    pub timed_out: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    /// Build a queued submission from a validated request, applying default limits
    pub fn queued(id: SubmissionId, language: Language, request: CreateSubmissionRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            language,
            source_code: request.source_code,
            stdin: request.stdin,
            expected_output: request.expected_output,
            time_limit_ms: non_zero_or(request.time_limit_ms, DEFAULT_TIME_LIMIT_MS),
            memory_limit_mb: non_zero_or(request.memory_limit_mb, DEFAULT_MEMORY_LIMIT_MB),
            max_output_bytes: non_zero_or(request.max_output_bytes, DEFAULT_MAX_OUTPUT_BYTES),
            status: Status::Queued,
            verdict: Verdict::Pending,
            compile_log: String::new(),
            runtime_log: String::new(),
            output: String::new(),
            runtime_ms: 0,
            memory_kb: 0,
            timed_out: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `done` with the given verdict. The only way a verdict is assigned.
    pub fn finish(&mut self, verdict: Verdict) {
        self.status = Status::Done;
        self.verdict = verdict;
    }
}

fn non_zero_or<T: Default + PartialEq>(value: Option<T>, fallback: T) -> T {
    match value {
        Some(v) if v != T::default() => v,
        _ => fallback,
    }
}

/// Client-facing projection of a submission
///
/// Source code, stdin and expected output are never echoed back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionView {
    pub id: SubmissionId,
    pub language: Language,
    pub status: Status,
    pub verdict: Verdict,
    pub compile_log: String,
    pub runtime_log: String,
    pub output: String,
    pub runtime_ms: u64,
    pub memory_kb: u64,
    pub timed_out: bool,
    pub time_limit_ms: u32,
    pub memory_limit_mb: u32,
    pub max_output_bytes: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Submission> for SubmissionView {
    fn from(s: &Submission) -> Self {
        Self {
            id: s.id.clone(),
            language: s.language,
            status: s.status,
            verdict: s.verdict,
            compile_log: s.compile_log.clone(),
            runtime_log: s.runtime_log.clone(),
            output: s.output.clone(),
            runtime_ms: s.runtime_ms,
            memory_kb: s.memory_kb,
            timed_out: s.timed_out,
            time_limit_ms: s.time_limit_ms,
            memory_limit_mb: s.memory_limit_mb,
            max_output_bytes: s.max_output_bytes,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_aliases() {
        assert_eq!("python".parse::<Language>().unwrap(), Language::Python311);
        assert_eq!("PY".parse::<Language>().unwrap(), Language::Python311);
        assert_eq!("cpp17".parse::<Language>().unwrap(), Language::Cpp17);
        assert_eq!("c++".parse::<Language>().unwrap(), Language::Cpp17);
        assert_eq!("java".parse::<Language>().unwrap(), Language::Java17);
    }

    #[test]
    fn test_language_unsupported() {
        let err = "ruby".parse::<Language>().unwrap_err();
        assert!(matches!(err, JudgeError::UnsupportedLanguage(ref l) if l == "ruby"));
    }

    #[test]
    fn test_requires_compile() {
        assert!(Language::Cpp17.requires_compile());
        assert!(Language::Java17.requires_compile());
        assert!(!Language::Python311.requires_compile());
    }

    #[test]
    fn test_queued_applies_defaults() {
        let request = CreateSubmissionRequest {
            language: "python".into(),
            source_code: "print(1)".into(),
            time_limit_ms: Some(0),
            ..Default::default()
        };
        let s = Submission::queued("id".into(), Language::Python311, request);
        assert_eq!(s.time_limit_ms, DEFAULT_TIME_LIMIT_MS);
        assert_eq!(s.memory_limit_mb, DEFAULT_MEMORY_LIMIT_MB);
        assert_eq!(s.max_output_bytes, DEFAULT_MAX_OUTPUT_BYTES);
        assert_eq!(s.status, Status::Queued);
        assert_eq!(s.verdict, Verdict::Pending);
    }

    #[test]
    fn test_queued_keeps_explicit_limits() {
        let request = CreateSubmissionRequest {
            time_limit_ms: Some(500),
            memory_limit_mb: Some(64),
            max_output_bytes: Some(2048),
            ..Default::default()
        };
        let s = Submission::queued("id".into(), Language::Cpp17, request);
        assert_eq!(s.time_limit_ms, 500);
        assert_eq!(s.memory_limit_mb, 64);
        assert_eq!(s.max_output_bytes, 2048);
    }

    #[test]
    fn test_view_hides_inputs() {
        let request = CreateSubmissionRequest {
            source_code: "secret source".into(),
            stdin: "secret input".into(),
            expected_output: "secret answer".into(),
            ..Default::default()
        };
        let s = Submission::queued("id".into(), Language::Python311, request);
        let json = serde_json::to_string(&SubmissionView::from(&s)).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"status\":\"queued\""));
    }

    #[test]
    fn test_status_order() {
        assert!(Status::Queued < Status::Compiling);
        assert!(Status::Compiling < Status::Running);
        assert!(Status::Running < Status::Done);
        assert!(Status::Done.is_terminal());
    }
}
