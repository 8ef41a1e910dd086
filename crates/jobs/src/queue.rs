//! Work queue abstraction.
//!
//! Models an external at-least-once task queue: items are delivered to
//! consumers, acknowledged on success, and on failure redelivered under the
//! item's retry policy. Items that exhaust their attempt budget are parked
//! for inspection, never dropped.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{JobId, RetryPolicy};

/// What gets enqueued: a reference to the job plus its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub job_id: JobId,
    pub payload: serde_json::Value,
}

/// One delivery of a work item to a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub item: WorkItem,
    /// 1-indexed; the first delivery is attempt 1.
    pub attempt: u32,
    pub policy: RetryPolicy,
}

/// A work item retained after its retry budget ran out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkedItem {
    pub item: WorkItem,
    pub attempts: u32,
    pub last_error: String,
    pub parked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("queue error: {0}")]
    Transport(String),
}

/// At-least-once work queue contract.
pub trait WorkQueue: Send + Sync {
    /// Enqueue a work item with its retry policy. The first delivery becomes
    /// available immediately.
    fn enqueue(&self, item: WorkItem, policy: RetryPolicy) -> Result<(), QueueError>;

    /// Claim the next delivery whose due time has passed, if any.
    fn next_ready(&self, now: DateTime<Utc>) -> Result<Option<Delivery>, QueueError>;

    /// Acknowledge a delivery: the item is done and discarded.
    fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Report a failed delivery. Schedules a redelivery with backoff while
    /// the attempt budget lasts, then parks the item.
    fn fail(&self, delivery: Delivery, error: &str, now: DateTime<Utc>) -> Result<(), QueueError>;

    /// Items retained after exhausting their retry budget.
    fn parked(&self) -> Result<Vec<ParkedItem>, QueueError>;
}

impl<T: WorkQueue + ?Sized> WorkQueue for std::sync::Arc<T> {
    fn enqueue(&self, item: WorkItem, policy: RetryPolicy) -> Result<(), QueueError> {
        (**self).enqueue(item, policy)
    }

    fn next_ready(&self, now: DateTime<Utc>) -> Result<Option<Delivery>, QueueError> {
        (**self).next_ready(now)
    }

    fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        (**self).ack(delivery)
    }

    fn fail(&self, delivery: Delivery, error: &str, now: DateTime<Utc>) -> Result<(), QueueError> {
        (**self).fail(delivery, error, now)
    }

    fn parked(&self) -> Result<Vec<ParkedItem>, QueueError> {
        (**self).parked()
    }
}

/// In-memory work queue for tests/dev.
///
/// Redeliveries sit in a delayed set until their due time; `next_ready`
/// promotes due entries before popping. Claim-then-crash loses the delivery
/// here — the production transport, not this shim, is what provides the
/// at-least-once guarantee across process deaths.
#[derive(Debug, Default)]
pub struct InMemoryWorkQueue {
    inner: Mutex<QueueState>,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Delivery>,
    delayed: Vec<(DateTime<Utc>, Delivery)>,
    parked: Vec<ParkedItem>,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries currently waiting (ready + delayed). Test/introspection
    /// helper.
    pub fn depth(&self) -> usize {
        let state = self.inner.lock().unwrap();
        state.ready.len() + state.delayed.len()
    }
}

impl WorkQueue for InMemoryWorkQueue {
    fn enqueue(&self, item: WorkItem, policy: RetryPolicy) -> Result<(), QueueError> {
        let mut state = self.inner.lock().unwrap();
        state.ready.push_back(Delivery {
            item,
            attempt: 1,
            policy,
        });
        Ok(())
    }

    fn next_ready(&self, now: DateTime<Utc>) -> Result<Option<Delivery>, QueueError> {
        let mut state = self.inner.lock().unwrap();

        // Promote due redeliveries, preserving due-time order.
        state.delayed.sort_by_key(|(due, _)| *due);
        while let Some((due, _)) = state.delayed.first() {
            if *due > now {
                break;
            }
            let (_, delivery) = state.delayed.remove(0);
            state.ready.push_back(delivery);
        }

        Ok(state.ready.pop_front())
    }

    fn ack(&self, _delivery: &Delivery) -> Result<(), QueueError> {
        // Successful items are discarded; the claim already removed it.
        Ok(())
    }

    fn fail(&self, delivery: Delivery, error: &str, now: DateTime<Utc>) -> Result<(), QueueError> {
        let mut state = self.inner.lock().unwrap();

        if delivery.policy.should_retry(delivery.attempt) {
            let next_attempt = delivery.attempt + 1;
            let delay = Duration::from_std(delivery.policy.delay_for_attempt(next_attempt))
                .unwrap_or_else(|_| Duration::zero());
            debug!(job_id = %delivery.item.job_id, next_attempt, "scheduling redelivery");
            state.delayed.push((
                now + delay,
                Delivery {
                    attempt: next_attempt,
                    ..delivery
                },
            ));
        } else {
            debug!(job_id = %delivery.item.job_id, attempts = delivery.attempt, "parking work item");
            state.parked.push(ParkedItem {
                attempts: delivery.attempt,
                item: delivery.item,
                last_error: error.to_string(),
                parked_at: now,
            });
        }
        Ok(())
    }

    fn parked(&self) -> Result<Vec<ParkedItem>, QueueError> {
        Ok(self.inner.lock().unwrap().parked.clone())
    }
}
