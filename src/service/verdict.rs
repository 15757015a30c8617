use crate::core::utils::outputs_match;
use crate::core::Verdict;
use crate::runner::RunResult;

/// Classify a finished run
///
/// Precedence: timeout, then non-zero exit, then output comparison.
/// Memory is not metered, so `MemoryLimitExceeded` is never produced.
pub fn classify(result: &RunResult, expected_output: &str) -> Verdict {
    if result.timed_out {
        Verdict::TimeLimitExceeded
    } else if result.exit_code != 0 {
        Verdict::RuntimeError
    } else if outputs_match(&result.stdout, expected_output) {
        Verdict::Accepted
    } else {
        Verdict::WrongAnswer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::TIMEOUT_EXIT_CODE;

    fn exited(code: i32, stdout: &str) -> RunResult {
        RunResult {
            stdout: stdout.to_string(),
            exit_code: code,
            ..Default::default()
        }
    }

    #[test]
    fn test_accepted_ignores_trailing_whitespace() {
        for stdout in ["hello\n", "hello \n", "hello", "hello\r\n"] {
            assert_eq!(classify(&exited(0, stdout), "hello"), Verdict::Accepted);
        }
    }

    #[test]
    fn test_wrong_answer() {
        assert_eq!(classify(&exited(0, "goodbye\n"), "hello"), Verdict::WrongAnswer);
    }

    #[test]
    fn test_runtime_error_beats_output() {
        assert_eq!(classify(&exited(1, "hello\n"), "hello"), Verdict::RuntimeError);
        assert_eq!(classify(&exited(139, ""), "hello"), Verdict::RuntimeError);
    }

    #[test]
    fn test_timeout_beats_everything() {
        let result = RunResult {
            stdout: "hello\n".into(),
            exit_code: TIMEOUT_EXIT_CODE,
            timed_out: true,
            ..Default::default()
        };
        assert_eq!(classify(&result, "hello"), Verdict::TimeLimitExceeded);
    }
}
