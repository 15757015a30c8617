//! Scripted runner for tests
//!
//! Simulates compile/run outcomes without spawning containers. By default it
//! mimics a handful of tiny programs:
//! - `print("...")` writes the quoted text to stdout
//! - `while True` runs into the deadline
//! - `raise` exits with status 1
//! - unbalanced brackets fail compilation

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{RunResult, Runner, RunnerError};
use crate::core::Submission;
use crate::sandbox::TIMEOUT_EXIT_CODE;

type CompileFn = dyn Fn(&Submission) -> Result<String, RunnerError> + Send + Sync;
type RunFn = dyn Fn(&Submission) -> Result<RunResult, RunnerError> + Send + Sync;

pub struct FakeRunner {
    compile: Box<CompileFn>,
    run: Box<RunFn>,
    delay: Duration,
    compile_calls: AtomicUsize,
    run_calls: AtomicUsize,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            compile: Box::new(mimic_compile),
            run: Box::new(mimic_run),
            delay: Duration::ZERO,
            compile_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_compile(
        mut self,
        f: impl Fn(&Submission) -> Result<String, RunnerError> + Send + Sync + 'static,
    ) -> Self {
        self.compile = Box::new(f);
        self
    }

    pub fn with_run(
        mut self,
        f: impl Fn(&Submission) -> Result<RunResult, RunnerError> + Send + Sync + 'static,
    ) -> Self {
        self.run = Box::new(f);
        self
    }

    /// Sleep this long inside every step, standing in for container latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn compile_calls(&self) -> usize {
        self.compile_calls.load(Ordering::SeqCst)
    }

    pub fn run_calls(&self) -> usize {
        self.run_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Runner for FakeRunner {
    async fn compile(&self, submission: &Submission) -> Result<String, RunnerError> {
        self.compile_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.compile)(submission)
    }

    async fn run(&self, submission: &Submission) -> Result<RunResult, RunnerError> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.run)(submission)
    }
}

fn mimic_compile(submission: &Submission) -> Result<String, RunnerError> {
    let src = &submission.source_code;
    let balanced = src.matches('(').count() == src.matches(')').count()
        && src.matches('{').count() == src.matches('}').count();
    if balanced {
        Ok(String::new())
    } else {
        Err(RunnerError::CompileFailed {
            log: "main.cpp:1:11: error: expected ')' before '{' token".to_string(),
        })
    }
}

fn mimic_run(submission: &Submission) -> Result<RunResult, RunnerError> {
    let src = &submission.source_code;

    if src.contains("while True") {
        return Ok(RunResult {
            exit_code: TIMEOUT_EXIT_CODE,
            timed_out: true,
            runtime_ms: u64::from(submission.time_limit_ms) + 1_000,
            ..Default::default()
        });
    }

    if src.contains("raise") {
        return Ok(RunResult {
            stderr: "Traceback (most recent call last):\nRuntimeError".to_string(),
            exit_code: 1,
            runtime_ms: 12,
            ..Default::default()
        });
    }

    let mut stdout: String = src
        .split("print(\"")
        .skip(1)
        .filter_map(|rest| rest.split_once("\")").map(|(text, _)| format!("{}\n", text)))
        .collect();
    crate::core::utils::truncate_utf8(&mut stdout, submission.max_output_bytes);

    Ok(RunResult {
        stdout,
        exit_code: 0,
        runtime_ms: 15,
        ..Default::default()
    })
}
