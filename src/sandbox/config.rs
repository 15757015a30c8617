//! Sandbox configuration
//!
//! Resource ceilings and deadlines applied to every container invocation.

use std::path::PathBuf;
use std::time::Duration;

/// Sandbox configuration
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Container runtime CLI (default: "docker")
    pub docker_bin: String,
    /// Parent directory for disposable workspaces (system temp dir if None)
    pub workspace_root: Option<PathBuf>,
    /// Fixed compile deadline, independent of the submission's time limit (20s)
    pub compile_timeout_ms: u64,
    /// Lower bound on the memory ceiling of both steps, in MB
    pub memory_floor_mb: u32,
    /// Extra wall time granted to the run step on top of the time limit
    pub run_grace_ms: u64,
    /// CPU share ceiling (docker --cpus)
    pub cpus: f32,
    /// Process-count ceiling for compile containers
    pub compile_pids_limit: u32,
    /// Process-count ceiling for run containers
    pub run_pids_limit: u32,
    /// Size of the writable, no-exec /tmp in run containers
    pub tmpfs_size_mb: u32,
    /// Captured stderr ceiling
    pub stderr_limit_bytes: usize,
    /// Floor applied to a submission's max output bytes
    pub stdout_floor_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            workspace_root: None,
            compile_timeout_ms: 20_000,
            memory_floor_mb: 128,
            run_grace_ms: 1_000,
            cpus: 1.0,
            compile_pids_limit: 128,
            run_pids_limit: 128,
            tmpfs_size_mb: 64,
            stderr_limit_bytes: 16 * 1024,
            stdout_floor_bytes: 1024,
        }
    }
}

impl SandboxConfig {
    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }

    /// Container memory ceiling: the submission's limit, but never below the
    /// floor the runtime needs to start a container
    pub fn memory_ceiling_mb(&self, submission_limit_mb: u32) -> u32 {
        submission_limit_mb.max(self.memory_floor_mb)
    }

    /// Run deadline: time limit plus the fixed grace period
    pub fn run_deadline(&self, time_limit_ms: u32) -> Duration {
        Duration::from_millis(u64::from(time_limit_ms) + self.run_grace_ms)
    }

    /// Captured stdout ceiling for a submission
    pub fn stdout_limit(&self, max_output_bytes: usize) -> usize {
        max_output_bytes.max(self.stdout_floor_bytes)
    }
}
