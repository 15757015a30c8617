//! Container invocation
//!
//! Low-level wrapper around the container runtime CLI. Every invocation runs
//! in a uniquely named, auto-removed container with networking disabled and
//! explicit memory, CPU and process ceilings, bounded by a wall-clock deadline.

use anyhow::{Context, Result};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::utils::capped_string;

/// Exit code reported when the deadline fired
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Exit code the runtime CLI uses when it could not start the container
const RUNTIME_FAILURE_EXIT_CODE: i32 = 125;

/// Mount point of the workspace inside the container
const BOX_DIR: &str = "/box";

/// Fresh disposable directory holding one step's files
///
/// Removed by `cleanup`, or on drop if a step bails out early.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("judge-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .context("Failed to create sandbox workspace")?;

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file into the workspace
    pub async fn write_file(&self, name: &str, content: &str) -> Result<()> {
        let dest = self.dir.path().join(name);
        fs::write(&dest, content)
            .await
            .with_context(|| format!("Failed to write {:?}", dest))
    }

    /// Remove the workspace
    pub fn cleanup(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .with_context(|| format!("Failed to remove workspace {:?}", path))?;
        debug!("Removed workspace {:?}", path);
        Ok(())
    }
}

/// Resource ceilings for one container
#[derive(Debug, Clone)]
pub struct ContainerLimits {
    pub memory_mb: u32,
    pub cpus: f32,
    pub pids: u32,
    pub tmpfs_mb: u32,
}

/// Everything needed to start one container
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub command: Vec<String>,
    pub workspace: PathBuf,
    pub limits: ContainerLimits,
    pub read_only_root: bool,
    pub stdin: Option<String>,
    pub deadline: Duration,
    pub stdout_limit: usize,
    pub stderr_limit: usize,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            command: vec![],
            workspace: workspace.into(),
            limits: ContainerLimits {
                memory_mb: 256,
                cpus: 1.0,
                pids: 64,
                tmpfs_mb: 64,
            },
            read_only_root: false,
            stdin: None,
            deadline: Duration::from_secs(10),
            stdout_limit: 64 * 1024,
            stderr_limit: 16 * 1024,
        }
    }

    pub fn with_command(mut self, command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limits(mut self, limits: ContainerLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_read_only_root(mut self, value: bool) -> Self {
        self.read_only_root = value;
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_output_limits(mut self, stdout_limit: usize, stderr_limit: usize) -> Self {
        self.stdout_limit = stdout_limit;
        self.stderr_limit = stderr_limit;
        self
    }

    /// Runtime CLI arguments for a container with the given name
    fn to_args(&self, name: &str, user: (u32, u32)) -> Vec<String> {
        let memory = format!("{}m", self.limits.memory_mb);

        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            format!("--name={}", name),
            "--network=none".to_string(),
            format!("--memory={}", memory),
            format!("--memory-swap={}", memory),
            format!("--cpus={}", self.limits.cpus),
            format!("--pids-limit={}", self.limits.pids),
            "--security-opt=no-new-privileges".to_string(),
            "--cap-drop=ALL".to_string(),
            format!("--user={}:{}", user.0, user.1),
            "--env=HOME=/tmp".to_string(),
            format!(
                "--tmpfs=/tmp:rw,noexec,nosuid,size={}m",
                self.limits.tmpfs_mb
            ),
            format!("--volume={}:{}", self.workspace.display(), BOX_DIR),
            format!("--workdir={}", BOX_DIR),
        ];

        if self.read_only_root {
            args.push("--read-only".to_string());
        }
        if self.stdin.is_some() {
            args.push("--interactive".to_string());
        }

        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

/// Raw outcome from one container (no verdict interpretation)
#[derive(Debug, Clone)]
pub struct SandboxOutcome {
    /// Exit code, `TIMEOUT_EXIT_CODE` if the deadline fired
    pub exit_code: i32,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock time from spawn to exit or kill
    pub wall_time_ms: u64,
}

/// Start a container and wait for it, bounded by its deadline
///
/// A deadline hit is a normal outcome (`timed_out`). Errors are reserved
/// for failures of the sandbox itself.
pub async fn execute(docker_bin: &str, spec: &ContainerSpec) -> Result<SandboxOutcome> {
    if spec.command.is_empty() {
        anyhow::bail!("No command specified for execution");
    }

    let name = format!("judge-{}", Uuid::new_v4().simple());
    let args = spec.to_args(&name, current_user());
    debug!("Running container with args: {:?}", args);

    let mut child = Command::new(docker_bin)
        .args(&args)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn container runtime '{}'", docker_bin))?;

    let started = Instant::now();

    let stdin_task = match (child.stdin.take(), spec.stdin.clone()) {
        (Some(mut pipe), Some(input)) => Some(tokio::spawn(async move {
            // The program may exit without reading its input
            let _ = pipe.write_all(input.as_bytes()).await;
            let _ = pipe.shutdown().await;
        })),
        _ => None,
    };

    let stdout = child.stdout.take().context("Container stdout not captured")?;
    let stderr = child.stderr.take().context("Container stderr not captured")?;
    let stdout_task = tokio::spawn(read_capped(stdout, spec.stdout_limit));
    let stderr_task = tokio::spawn(read_capped(stderr, spec.stderr_limit));

    let waited = tokio::time::timeout(spec.deadline, child.wait()).await;
    let (exit_code, timed_out) = match waited {
        Ok(status) => {
            let status = status.context("Failed to wait for container runtime")?;
            (exit_code_of(status), false)
        }
        Err(_) => {
            warn!(
                "Container {} exceeded deadline of {}ms, killing",
                name,
                spec.deadline.as_millis()
            );
            if let Err(e) = child.kill().await {
                warn!("Failed to kill container runtime process: {}", e);
            }
            force_remove(docker_bin, &name).await;
            (TIMEOUT_EXIT_CODE, true)
        }
    };
    let wall_time_ms = started.elapsed().as_millis() as u64;

    if let Some(task) = stdin_task {
        let _ = task.await;
    }
    let stdout_bytes = stdout_task
        .await
        .context("Stdout reader task failed")?
        .context("Failed to read container stdout")?;
    let stderr_bytes = stderr_task
        .await
        .context("Stderr reader task failed")?
        .context("Failed to read container stderr")?;

    let stdout = capped_string(&stdout_bytes, spec.stdout_limit);
    let stderr = capped_string(&stderr_bytes, spec.stderr_limit);

    if !timed_out && exit_code == RUNTIME_FAILURE_EXIT_CODE {
        anyhow::bail!("Container runtime failed to start sandbox: {}", stderr.trim());
    }

    debug!(
        "Container {} finished: exit_code={}, timed_out={}, wall_time_ms={}",
        name, exit_code, timed_out, wall_time_ms
    );

    Ok(SandboxOutcome {
        exit_code,
        timed_out,
        stdout,
        stderr,
        wall_time_ms,
    })
}

/// Drain a pipe to EOF, keeping at most `limit` bytes
///
/// Reading continues past the limit so a chatty program never blocks on a
/// full pipe.
async fn read_capped<R>(mut reader: R, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.len());
        captured.extend_from_slice(&buf[..n.min(room)]);
    }
    Ok(captured)
}

fn exit_code_of(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => 128 + status.signal().unwrap_or(0),
    }
}

/// Remove a container by name, stopping it if still running
async fn force_remove(docker_bin: &str, name: &str) {
    match Command::new(docker_bin)
        .args(["rm", "-f", name])
        .output()
        .await
    {
        Ok(output) if output.status.success() => debug!("Removed container {}", name),
        Ok(output) => warn!(
            "Failed to remove container {}: {}",
            name,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
        Err(e) => warn!("Failed to run container removal for {}: {}", name, e),
    }
}

/// Run containers as the judge's own user so workspace files stay removable
fn current_user() -> (u32, u32) {
    (
        nix::unistd::getuid().as_raw(),
        nix::unistd::getgid().as_raw(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Stand-in for the runtime CLI: a shell script that ignores the run arguments
    fn fake_runtime(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-docker");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn spec(workspace: &Path) -> ContainerSpec {
        ContainerSpec::new("python:3.11-slim", workspace).with_command(["python3", "main.py"])
    }

    #[test]
    fn test_args_isolation_flags() {
        let spec = spec(Path::new("/tmp/ws"))
            .with_limits(ContainerLimits {
                memory_mb: 256,
                cpus: 0.5,
                pids: 32,
                tmpfs_mb: 16,
            })
            .with_read_only_root(true)
            .with_stdin("1 2\n");
        let args = spec.to_args("judge-test", (1000, 1000));

        assert_eq!(args[0], "run");
        assert!(args.contains(&"--rm".to_string()));
        assert!(args.contains(&"--name=judge-test".to_string()));
        assert!(args.contains(&"--network=none".to_string()));
        assert!(args.contains(&"--memory=256m".to_string()));
        assert!(args.contains(&"--memory-swap=256m".to_string()));
        assert!(args.contains(&"--cpus=0.5".to_string()));
        assert!(args.contains(&"--pids-limit=32".to_string()));
        assert!(args.contains(&"--read-only".to_string()));
        assert!(args.contains(&"--interactive".to_string()));
        assert!(args.contains(&"--tmpfs=/tmp:rw,noexec,nosuid,size=16m".to_string()));
        assert!(args.contains(&"--volume=/tmp/ws:/box".to_string()));
        assert!(args.contains(&"--user=1000:1000".to_string()));

        // image comes right before the command
        let tail = &args[args.len() - 3..];
        assert_eq!(tail, ["python:3.11-slim", "python3", "main.py"]);
    }

    #[test]
    fn test_args_writable_root_without_stdin() {
        let args = spec(Path::new("/tmp/ws")).to_args("judge-test", (0, 0));
        assert!(!args.contains(&"--read-only".to_string()));
        assert!(!args.contains(&"--interactive".to_string()));
    }

    #[tokio::test]
    async fn test_read_capped_drains_past_limit() {
        let data = vec![b'a'; 20_000];
        let captured = read_capped(&data[..], 100).await.unwrap();
        assert_eq!(captured.len(), 100);
    }

    #[test]
    fn test_workspace_cleanup_removes_dir() {
        let workspace = Workspace::create(None).unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::write(path.join("main.py"), "print(1)").unwrap();
        assert!(path.exists());
        workspace.cleanup().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let path = {
            let workspace = Workspace::create(None).unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_execute_missing_runtime_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = execute("/nonexistent/docker", &spec(dir.path())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_execute_empty_command_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ContainerSpec::new("python:3.11-slim", dir.path());
        assert!(execute("docker", &spec).await.is_err());
    }

    #[tokio::test]
    async fn test_execute_captures_and_truncates_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = fake_runtime(dir.path(), "head -c 5000 /dev/zero | tr '\\0' x\necho oops >&2\nexit 3");
        let spec = spec(dir.path()).with_output_limits(1024, 16 * 1024);

        let outcome = execute(&runtime, &spec).await.unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert!(!outcome.timed_out);
        assert_eq!(outcome.stdout.len(), 1024);
        assert_eq!(outcome.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_execute_pipes_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = fake_runtime(dir.path(), "exec cat");
        let spec = spec(dir.path()).with_stdin("1 2 3\n");

        let outcome = execute(&runtime, &spec).await.unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.stdout, "1 2 3\n");
    }

    #[tokio::test]
    async fn test_execute_deadline_sets_timed_out() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = fake_runtime(
            dir.path(),
            "if [ \"$1\" = \"rm\" ]; then exit 0; fi\nexec sleep 10",
        );
        let spec = spec(dir.path()).with_deadline(Duration::from_millis(200));

        let outcome = execute(&runtime, &spec).await.unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, TIMEOUT_EXIT_CODE);
        assert!(outcome.wall_time_ms >= 200);
        assert!(outcome.wall_time_ms < 5_000);
    }

    #[tokio::test]
    async fn test_execute_runtime_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = fake_runtime(dir.path(), "echo 'daemon not running' >&2\nexit 125");

        let err = execute(&runtime, &spec(dir.path())).await.unwrap_err();
        assert!(format!("{:#}", err).contains("daemon not running"));
    }
}
