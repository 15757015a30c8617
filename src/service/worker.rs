//! Worker pool and per-submission pipeline
//!
//! Each worker takes one id at a time off the shared queue and drives it
//! through compile -> run -> verdict. Shutdown stops workers from taking new
//! jobs; a sandbox step already in flight runs until it exits or hits its own
//! deadline.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::verdict::classify;
use super::JudgeService;
use crate::core::{JudgeError, Status, Submission, Verdict};

/// Handle to the running workers
///
/// Dropping it leaves the workers running for the rest of the process;
/// only `shutdown` stops them.
#[must_use = "workers can only be stopped through the pool handle"]
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(super) fn spawn(service: Arc<JudgeService>, count: usize) -> Self {
        let (shutdown, _) = watch::channel(false);
        let handles = (0..count)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&service),
                    shutdown.subscribe(),
                ))
            })
            .collect();

        Self { shutdown, handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Signal every worker to stop and wait for them to finish their current job
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }
        info!("All workers stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    service: Arc<JudgeService>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Worker {} started", worker_id);
    let mut signal_open = true;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let next = tokio::select! {
            biased;
            changed = shutdown.changed(), if signal_open => {
                if changed.is_err() {
                    // Pool handle dropped without a shutdown: keep serving
                    debug!("Worker {} lost its pool handle", worker_id);
                    signal_open = false;
                }
                continue;
            }
            id = service.next_job() => id,
        };
        let Some(id) = next else {
            break;
        };

        debug!("Worker {} picked up submission {}", worker_id, id);
        if AssertUnwindSafe(service.process(&id))
            .catch_unwind()
            .await
            .is_err()
        {
            error!("Worker {} panicked while judging {}", worker_id, id);
            service.abort(&id, "internal judge error");
        }
    }

    info!("Worker {} stopped", worker_id);
}

impl JudgeService {
    /// Drive one submission to its terminal state
    ///
    /// Pipeline failures end up in the submission (CE/RE), never in the caller.
    pub(super) async fn process(&self, id: &str) {
        let submission = match self.store.get(id) {
            Ok(submission) => submission,
            Err(e) => {
                warn!("Dequeued unknown submission: {}", e);
                return;
            }
        };

        if let Err(e) = self.judge(submission).await {
            error!("Failed to record progress of submission {}: {}", id, e);
        }
    }

    async fn judge(&self, submission: Submission) -> Result<(), JudgeError> {
        let id = submission.id.as_str();
        let mut compile_log = None;

        if submission.language.requires_compile() {
            self.store.update(id, |s| s.status = Status::Compiling)?;

            match self.runner.compile(&submission).await {
                Ok(log) => {
                    if !log.trim().is_empty() {
                        compile_log = Some(log);
                    }
                }
                Err(e) => {
                    let log = e.log();
                    self.store.update(id, move |s| {
                        s.compile_log = log;
                        s.finish(Verdict::CompileError);
                    })?;
                    info!("Submission {} finished: verdict={}", id, Verdict::CompileError);
                    return Ok(());
                }
            }
        }

        // Compiler diagnostics ride along with the running transition
        self.store.update(id, move |s| {
            s.status = Status::Running;
            if let Some(log) = compile_log {
                s.compile_log = log;
            }
        })?;

        let result = match self.runner.run(&submission).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Sandbox failed for submission {}: {}", id, e);
                let log = e.log();
                self.store.update(id, move |s| {
                    s.runtime_log = log;
                    s.finish(Verdict::RuntimeError);
                })?;
                return Ok(());
            }
        };

        let verdict = classify(&result, &submission.expected_output);
        info!(
            "Submission {} finished: verdict={}, runtime_ms={}, timed_out={}",
            id, verdict, result.runtime_ms, result.timed_out
        );

        self.store.update(id, move |s| {
            s.output = result.stdout;
            s.runtime_log = result.stderr;
            s.runtime_ms = result.runtime_ms;
            s.memory_kb = result.memory_kb;
            s.timed_out = result.timed_out;
            s.finish(verdict);
        })?;

        Ok(())
    }

    /// Force a submission into RE, used when its pipeline could not complete
    pub(super) fn abort(&self, id: &str, message: &str) {
        let message = message.to_string();
        if let Err(e) = self.store.update(id, move |s| {
            s.runtime_log = message;
            s.finish(Verdict::RuntimeError);
        }) {
            error!("Failed to abort submission {}: {}", id, e);
        }
    }
}
