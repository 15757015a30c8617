//! Submission store
//!
//! In-memory registry of submissions plus per-submission event fan-out.
//! Each record sits behind its own lock so a `get` never waits on an
//! unrelated `update`. Events are published after the record lock is
//! released, so a slow subscriber can never stall a worker.

mod subscribers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::warn;

use crate::core::{Event, JudgeError, Submission, SubmissionId};
use subscribers::SubscriberRegistry;

pub use subscribers::{DeliveryPolicy, Subscription};

/// Capacity of each subscriber's outbox
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;

pub struct SubmissionStore {
    records: RwLock<HashMap<SubmissionId, Arc<Mutex<Submission>>>>,
    subscribers: Arc<SubscriberRegistry>,
    buffer_size: usize,
}

impl Default for SubmissionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER, DeliveryPolicy::default())
    }
}

impl SubmissionStore {
    pub fn new(buffer_size: usize, policy: DeliveryPolicy) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            subscribers: Arc::new(SubscriberRegistry::new(policy)),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Insert a new record. Ids are generated by the service and never reused.
    pub fn create(&self, submission: Submission) -> Submission {
        let snapshot = submission.clone();
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records
            .insert(submission.id.clone(), Arc::new(Mutex::new(submission)))
            .is_some()
        {
            warn!("Submission {} was created twice", snapshot.id);
        }
        snapshot
    }

    /// Consistent snapshot of one record
    pub fn get(&self, id: &str) -> Result<Submission, JudgeError> {
        let record = self.record(id)?;
        let submission = record.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(submission.clone())
    }

    /// Apply `mutate` to the record under exclusive access, stamp the update
    /// time, then publish the resulting event to subscribers.
    ///
    /// Once a record is `done` it is immutable: further updates are ignored
    /// and publish nothing.
    pub fn update<F>(&self, id: &str, mutate: F) -> Result<Submission, JudgeError>
    where
        F: FnOnce(&mut Submission),
    {
        let record = self.record(id)?;

        let snapshot = {
            let mut current = record.lock().unwrap_or_else(PoisonError::into_inner);
            if current.status.is_terminal() {
                warn!("Ignoring update to finished submission {}", id);
                return Ok(current.clone());
            }

            let mut next = current.clone();
            mutate(&mut next);
            next.id = current.id.clone();
            next.updated_at = Utc::now();
            *current = next;
            current.clone()
        };

        self.subscribers.publish(&Event::from_submission(&snapshot));
        Ok(snapshot)
    }

    /// Register a subscriber for a submission's events
    ///
    /// If the submission is already `done`, the returned stream yields the
    /// terminal snapshot once and then ends.
    pub fn subscribe(&self, id: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer_size);
        let key = self.subscribers.register(id, sender.clone());

        if let Ok(current) = self.get(id) {
            if current.status.is_terminal() {
                self.subscribers.unregister(id, key);
                // Fresh channel with capacity >= 1, cannot be full
                let _ = sender.try_send(Event::from_submission(&current));
            }
        }

        Subscription::new(id.to_string(), key, receiver, Arc::clone(&self.subscribers))
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscriber_count(&self, id: &str) -> usize {
        self.subscribers.subscriber_count(id)
    }

    /// Events dropped because a subscriber's outbox was full
    pub fn dropped_events(&self) -> u64 {
        self.subscribers.dropped_events()
    }

    fn record(&self, id: &str) -> Result<Arc<Mutex<Submission>>, JudgeError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records
            .get(id)
            .cloned()
            .ok_or_else(|| JudgeError::NotFound(id.to_string()))
    }
}
