//! Service module - Submission intake and judging workers
//!
//! `JudgeService` is the single entry point used by the HTTP layer:
//! - `submit`: validate, record as queued, enqueue for a worker
//! - `get` / `subscribe`: read current state or follow its progress
//! - `start_workers`: spawn the fixed-size worker pool
//!
//! The service module does NOT:
//! - Build sandbox commands (see runner)
//! - Know about HTTP or SSE framing (see server)

mod verdict;
mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};
use uuid::Uuid;

use crate::core::{CreateSubmissionRequest, JudgeError, Language, Submission, SubmissionId};
use crate::runner::Runner;
use crate::store::{SubmissionStore, Subscription};

pub use worker::WorkerPool;

pub struct JudgeService {
    store: Arc<SubmissionStore>,
    runner: Arc<dyn Runner>,
    queue: mpsc::Sender<SubmissionId>,
    jobs: Mutex<mpsc::Receiver<SubmissionId>>,
    workers_started: AtomicBool,
}

impl JudgeService {
    /// `queue_capacity` bounds the pending-job queue; `submit` waits when it is full.
    pub fn new(store: Arc<SubmissionStore>, runner: Arc<dyn Runner>, queue_capacity: usize) -> Self {
        let (queue, jobs) = mpsc::channel(queue_capacity.max(1));
        Self {
            store,
            runner,
            queue,
            jobs: Mutex::new(jobs),
            workers_started: AtomicBool::new(false),
        }
    }

    /// Validate and enqueue a submission, returning its initial snapshot
    ///
    /// Validation failures create no record. Waits for queue space when the
    /// workers are saturated.
    pub async fn submit(&self, request: CreateSubmissionRequest) -> Result<Submission, JudgeError> {
        if request.source_code.is_empty() {
            return Err(JudgeError::EmptySource);
        }
        let language: Language = request.language.parse()?;

        let id = Uuid::new_v4().to_string();
        let submission = self.store.create(Submission::queued(id, language, request));
        info!(
            "Accepted submission {} ({}, {} bytes)",
            submission.id,
            submission.language,
            submission.source_code.len()
        );

        // The receiver is owned by `self`, so this only fails while the
        // service itself is being torn down.
        if self.queue.send(submission.id.clone()).await.is_err() {
            error!("Job queue closed, abandoning submission {}", submission.id);
            self.abort(&submission.id, "judge is shutting down");
            return Err(JudgeError::QueueClosed);
        }

        Ok(submission)
    }

    pub fn get(&self, id: &str) -> Result<Submission, JudgeError> {
        self.store.get(id)
    }

    /// Follow a submission's progress. Unknown ids are rejected.
    pub fn subscribe(&self, id: &str) -> Result<Subscription, JudgeError> {
        self.store.get(id)?;
        Ok(self.store.subscribe(id))
    }

    /// Spawn `count` workers (at least one). May only be called once.
    #[must_use = "dropping the pool leaves no way to stop the workers"]
    pub fn start_workers(self: &Arc<Self>, count: usize) -> Result<WorkerPool, JudgeError> {
        if self.workers_started.swap(true, Ordering::SeqCst) {
            return Err(JudgeError::WorkersAlreadyStarted);
        }
        let count = count.max(1);
        info!("Starting {} judge workers", count);
        Ok(WorkerPool::spawn(Arc::clone(self), count))
    }

    async fn next_job(&self) -> Option<SubmissionId> {
        let mut jobs = self.jobs.lock().await;
        jobs.recv().await
    }
}
