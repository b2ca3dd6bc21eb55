//! FIFO delivery queue with an optional persisted journal.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::observation::{OutboundObservation, Priority};
use super::wire::WirePayload;
use crate::store::TieredStore;

/// Store key under which the queue journal persists.
pub const QUEUE_JOURNAL_KEY: &str = "delivery:queue";

/// A queued payload plus the bookkeeping needed for retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub observation_id: Uuid,
    pub kind: String,
    pub priority: Priority,
    /// Completed transmission attempts so far.
    pub attempts: u32,
    pub payload: WirePayload,
}

impl Envelope {
    #[must_use]
    pub fn new(observation: &OutboundObservation, payload: WirePayload) -> Self {
        Self {
            observation_id: observation.id,
            kind: observation.kind.clone(),
            priority: observation.priority,
            attempts: 0,
            payload,
        }
    }
}

/// Strict FIFO queue. When built with a journal, every mutation rewrites
/// the persisted snapshot so a crash or teardown loses at most the
/// payload in flight, never the backlog.
#[derive(Default)]
pub struct DeliveryQueue {
    items: VecDeque<Envelope>,
    journal: Option<Arc<TieredStore>>,
}

impl DeliveryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a journaled queue, restoring any backlog a previous session
    /// left behind.
    #[must_use]
    pub fn with_journal(store: Arc<TieredStore>) -> Self {
        let items = match store.get(QUEUE_JOURNAL_KEY) {
            None => VecDeque::new(),
            Some(raw) => match serde_json::from_str::<Vec<Envelope>>(&raw) {
                Ok(entries) => {
                    if !entries.is_empty() {
                        debug!(restored = entries.len(), "restored delivery backlog from journal");
                    }
                    entries.into()
                },
                Err(err) => {
                    debug!(error = %err, "delivery journal unreadable, starting empty");
                    VecDeque::new()
                },
            },
        };
        Self {
            items,
            journal: Some(store),
        }
    }

    pub fn push(&mut self, envelope: Envelope) {
        self.items.push_back(envelope);
        self.sync_journal();
    }

    pub fn pop(&mut self) -> Option<Envelope> {
        let envelope = self.items.pop_front();
        if envelope.is_some() {
            self.sync_journal();
        }
        envelope
    }

    /// Returns a failed payload to the tail with its attempt count bumped.
    pub fn requeue(&mut self, mut envelope: Envelope) {
        envelope.attempts += 1;
        self.items.push_back(envelope);
        self.sync_journal();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn sync_journal(&self) {
        let Some(store) = &self.journal else {
            return;
        };
        let entries: Vec<&Envelope> = self.items.iter().collect();
        match serde_json::to_string(&entries) {
            Ok(raw) => store.put(QUEUE_JOURNAL_KEY, &raw),
            Err(err) => {
                debug!(error = %err, "delivery journal not serializable, snapshot skipped");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::wire::{payload_for, SenderIdentity};

    fn envelope(kind: &str) -> Envelope {
        let observation = OutboundObservation::new(kind, "CalmHeron1204");
        let sender = SenderIdentity {
            username: "Cohort".to_string(),
            avatar_url: None,
        };
        Envelope::new(&observation, payload_for(&observation, &sender))
    }

    #[test]
    fn pops_in_push_order() {
        let mut queue = DeliveryQueue::new();
        queue.push(envelope("first"));
        queue.push(envelope("second"));
        queue.push(envelope("third"));

        assert_eq!(queue.pop().unwrap().kind, "first");
        assert_eq!(queue.pop().unwrap().kind, "second");
        assert_eq!(queue.pop().unwrap().kind, "third");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn requeue_moves_to_tail_and_counts_attempt() {
        let mut queue = DeliveryQueue::new();
        queue.push(envelope("flaky"));
        queue.push(envelope("second"));

        let failed = queue.pop().unwrap();
        assert_eq!(failed.attempts, 0);
        queue.requeue(failed);

        assert_eq!(queue.pop().unwrap().kind, "second");
        let retried = queue.pop().unwrap();
        assert_eq!(retried.kind, "flaky");
        assert_eq!(retried.attempts, 1);
    }

    #[test]
    fn journal_restores_backlog_across_sessions() {
        let store = Arc::new(TieredStore::in_memory());
        {
            let mut queue = DeliveryQueue::with_journal(store.clone());
            queue.push(envelope("sent_before_crash"));
            queue.push(envelope("kept_a"));
            queue.push(envelope("kept_b"));
            let _ = queue.pop();
        }

        let mut restored = DeliveryQueue::with_journal(store);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.pop().unwrap().kind, "kept_a");
        assert_eq!(restored.pop().unwrap().kind, "kept_b");
    }

    #[test]
    fn corrupt_journal_starts_empty() {
        let store = Arc::new(TieredStore::in_memory());
        store.put(QUEUE_JOURNAL_KEY, "not json");
        let queue = DeliveryQueue::with_journal(store);
        assert!(queue.is_empty());
    }

    #[test]
    fn unjournaled_queue_writes_nothing() {
        let mut queue = DeliveryQueue::new();
        queue.push(envelope("volatile"));
        assert_eq!(queue.len(), 1);
    }
}
