//! Per-submission subscriber registry
//!
//! Maps a submission id to a set of bounded outboxes. Publishing never
//! blocks: a full outbox is handled according to the `DeliveryPolicy`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::{Event, SubmissionId};

/// What to do when a subscriber's outbox is full at publish time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Drop the event for that subscriber only and keep it registered
    #[default]
    DropOnFull,
    /// Unregister the subscriber; its stream ends after draining
    DisconnectOnFull,
}

#[derive(Debug, Default)]
pub(super) struct SubscriberRegistry {
    outboxes: RwLock<HashMap<SubmissionId, HashMap<u64, mpsc::Sender<Event>>>>,
    next_key: AtomicU64,
    dropped: AtomicU64,
    policy: DeliveryPolicy,
}

impl SubscriberRegistry {
    pub(super) fn new(policy: DeliveryPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub(super) fn register(&self, id: &str, sender: mpsc::Sender<Event>) -> u64 {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let mut outboxes = self.outboxes.write().unwrap_or_else(PoisonError::into_inner);
        outboxes.entry(id.to_string()).or_default().insert(key, sender);
        key
    }

    /// Remove one subscriber. No-op if it is already gone.
    pub(super) fn unregister(&self, id: &str, key: u64) {
        let mut outboxes = self.outboxes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(subscribers) = outboxes.get_mut(id) {
            subscribers.remove(&key);
            if subscribers.is_empty() {
                outboxes.remove(id);
            }
        }
    }

    /// Deliver an event to every current subscriber of its submission
    ///
    /// A terminal event closes every subscriber of that submission afterwards.
    pub(super) fn publish(&self, event: &Event) {
        let id = &event.submission_id;
        let mut evicted = Vec::new();

        {
            let outboxes = self.outboxes.read().unwrap_or_else(PoisonError::into_inner);
            let Some(subscribers) = outboxes.get(id) else {
                return;
            };

            for (key, sender) in subscribers {
                match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            "Subscriber {} of {} is full, dropped {} event",
                            key, id, event.status
                        );
                        if self.policy == DeliveryPolicy::DisconnectOnFull {
                            evicted.push(*key);
                        }
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => evicted.push(*key),
                }
            }
        }

        if event.is_terminal() {
            let mut outboxes = self.outboxes.write().unwrap_or_else(PoisonError::into_inner);
            outboxes.remove(id);
        } else {
            for key in evicted {
                self.unregister(id, key);
            }
        }
    }

    pub(super) fn subscriber_count(&self, id: &str) -> usize {
        let outboxes = self.outboxes.read().unwrap_or_else(PoisonError::into_inner);
        outboxes.get(id).map_or(0, HashMap::len)
    }

    pub(super) fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Live event stream for one submission
///
/// Ends once the submission reaches `done`, or when the subscriber is
/// cancelled or evicted. Dropping it unregisters the subscriber.
pub struct Subscription {
    submission_id: SubmissionId,
    key: u64,
    receiver: mpsc::Receiver<Event>,
    registry: std::sync::Arc<SubscriberRegistry>,
}

impl Subscription {
    pub(super) fn new(
        submission_id: SubmissionId,
        key: u64,
        receiver: mpsc::Receiver<Event>,
        registry: std::sync::Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            submission_id,
            key,
            receiver,
            registry,
        }
    }

    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    /// Next event, or None once the stream has ended
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Unregister and close the stream
    pub fn cancel(self) {
        drop(self);
    }

    pub fn into_stream(self) -> impl Stream<Item = Event> + Send + 'static {
        futures_util::stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|event| (event, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.receiver.close();
        self.registry.unregister(&self.submission_id, self.key);
    }
}
