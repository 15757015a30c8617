//! Sandboxed runner implementation using containers
//!
//! Executes untrusted user code in disposable, resource-capped containers.
//! Compile and run each get their own fresh workspace.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{RunResult, Runner, RunnerError};
use crate::core::Submission;
use crate::languages::{LanguageConfig, LanguageTable};
use crate::sandbox::{self, ContainerLimits, ContainerSpec, SandboxConfig, Workspace};

/// Runner that executes code in container sandboxes
pub struct SandboxedRunner {
    config: SandboxConfig,
    languages: LanguageTable,
}

impl SandboxedRunner {
    pub fn new(config: SandboxConfig, languages: LanguageTable) -> Self {
        Self { config, languages }
    }

    fn language_config(&self, submission: &Submission) -> Result<&LanguageConfig, RunnerError> {
        self.languages
            .get(submission.language)
            .ok_or(RunnerError::UnsupportedLanguage(submission.language))
    }

    async fn prepare_workspace(
        &self,
        lang: &LanguageConfig,
        submission: &Submission,
    ) -> Result<Workspace, RunnerError> {
        let workspace = Workspace::create(self.config.workspace_root.as_deref())?;
        workspace
            .write_file(&lang.source_file, &submission.source_code)
            .await?;
        Ok(workspace)
    }
}

/// Release a workspace, logging instead of failing the step
fn release(workspace: Workspace) {
    if let Err(e) = workspace.cleanup() {
        warn!("{:#}", e);
    }
}

#[async_trait]
impl Runner for SandboxedRunner {
    async fn compile(&self, submission: &Submission) -> Result<String, RunnerError> {
        let lang = self.language_config(submission)?;
        let compile_cmd = match &lang.compile_command {
            Some(cmd) => cmd,
            // Interpreted language, no compilation needed
            None => return Ok(String::new()),
        };

        let workspace = self.prepare_workspace(lang, submission).await?;
        debug!(
            "Compiling submission {} with {:?}",
            submission.id, compile_cmd
        );

        let spec = ContainerSpec::new(&lang.image, workspace.path())
            .with_command(compile_cmd)
            .with_limits(ContainerLimits {
                memory_mb: self.config.memory_ceiling_mb(submission.memory_limit_mb),
                cpus: self.config.cpus,
                pids: self.config.compile_pids_limit,
                tmpfs_mb: self.config.tmpfs_size_mb,
            })
            .with_deadline(self.config.compile_timeout())
            .with_output_limits(self.config.stderr_limit_bytes, self.config.stderr_limit_bytes);

        let result = sandbox::execute(&self.config.docker_bin, &spec).await;
        release(workspace);
        let outcome = result?;

        let log = join_output(&outcome.stderr, &outcome.stdout);
        if outcome.timed_out {
            info!("Compilation of {} timed out", submission.id);
            return Err(RunnerError::CompileTimeout {
                limit_ms: self.config.compile_timeout_ms,
                log,
            });
        }

        if outcome.exit_code != 0 {
            let log = if log.is_empty() {
                format!("Compilation failed with exit code {}", outcome.exit_code)
            } else {
                log
            };
            return Err(RunnerError::CompileFailed { log });
        }

        Ok(log)
    }

    async fn run(&self, submission: &Submission) -> Result<RunResult, RunnerError> {
        let lang = self.language_config(submission)?;
        let workspace = self.prepare_workspace(lang, submission).await?;

        let command = lang.run_invocation();
        debug!("Running submission {} with {:?}", submission.id, command);

        let spec = ContainerSpec::new(&lang.image, workspace.path())
            .with_command(command)
            .with_limits(ContainerLimits {
                memory_mb: self.config.memory_ceiling_mb(submission.memory_limit_mb),
                cpus: self.config.cpus,
                pids: self.config.run_pids_limit,
                tmpfs_mb: self.config.tmpfs_size_mb,
            })
            .with_read_only_root(true)
            .with_stdin(submission.stdin.as_str())
            .with_deadline(self.config.run_deadline(submission.time_limit_ms))
            .with_output_limits(
                self.config.stdout_limit(submission.max_output_bytes),
                self.config.stderr_limit_bytes,
            );

        let result = sandbox::execute(&self.config.docker_bin, &spec).await;
        release(workspace);
        let outcome = result?;

        Ok(RunResult {
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_code: outcome.exit_code,
            timed_out: outcome.timed_out,
            runtime_ms: outcome.wall_time_ms,
            memory_kb: 0,
        })
    }
}

fn join_output(stderr: &str, stdout: &str) -> String {
    match (stderr.trim().is_empty(), stdout.trim().is_empty()) {
        (true, true) => String::new(),
        (false, true) => stderr.to_string(),
        (true, false) => stdout.to_string(),
        (false, false) => format!("{}\n{}", stderr.trim_end(), stdout),
    }
}
