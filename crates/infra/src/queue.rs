//! Redis-backed work queue.
//!
//! Three keys per queue: a ready list (LPUSH/RPOP), a delayed sorted set
//! scored by due time in epoch milliseconds, and a parked list for items that
//! exhausted their retry budget. `next_ready` promotes due entries from the
//! sorted set before popping; the ZREM result arbitrates when several
//! processes promote concurrently.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use redis::Commands;
use tracing::debug;

use jobhub_jobs::{Delivery, ParkedItem, QueueError, RetryPolicy, WorkItem, WorkQueue};

/// How many due entries one `next_ready` call promotes at most.
const PROMOTE_BATCH: isize = 16;

pub struct RedisWorkQueue {
    connection: Mutex<redis::Connection>,
    ready_key: String,
    delayed_key: String,
    parked_key: String,
}

impl RedisWorkQueue {
    /// Connect and namespace the queue keys under `prefix`.
    pub fn connect(url: &str, prefix: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url).map_err(to_queue_error)?;
        let connection = client.get_connection().map_err(to_queue_error)?;

        Ok(Self {
            connection: Mutex::new(connection),
            ready_key: format!("{prefix}:ready"),
            delayed_key: format!("{prefix}:delayed"),
            parked_key: format!("{prefix}:parked"),
        })
    }
}

fn to_queue_error(e: redis::RedisError) -> QueueError {
    QueueError::Transport(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, QueueError> {
    serde_json::to_string(value).map_err(|e| QueueError::Transport(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, QueueError> {
    serde_json::from_str(raw).map_err(|e| QueueError::Transport(e.to_string()))
}

impl WorkQueue for RedisWorkQueue {
    fn enqueue(&self, item: WorkItem, policy: RetryPolicy) -> Result<(), QueueError> {
        let delivery = Delivery {
            item,
            attempt: 1,
            policy,
        };
        let raw = encode(&delivery)?;

        let mut con = self.connection.lock().unwrap();
        let _: () = con.lpush(&self.ready_key, raw).map_err(to_queue_error)?;
        Ok(())
    }

    fn next_ready(&self, now: DateTime<Utc>) -> Result<Option<Delivery>, QueueError> {
        let mut con = self.connection.lock().unwrap();

        // Promote due redeliveries.
        let due: Vec<String> = con
            .zrangebyscore_limit(
                &self.delayed_key,
                "-inf",
                now.timestamp_millis(),
                0,
                PROMOTE_BATCH,
            )
            .map_err(to_queue_error)?;

        for raw in due {
            let removed: i64 = con
                .zrem(&self.delayed_key, &raw)
                .map_err(to_queue_error)?;
            // Whoever removed the member owns the promotion.
            if removed == 1 {
                let _: () = con.lpush(&self.ready_key, raw).map_err(to_queue_error)?;
            }
        }

        let raw: Option<String> = con.rpop(&self.ready_key, None).map_err(to_queue_error)?;
        raw.as_deref().map(decode).transpose()
    }

    fn ack(&self, _delivery: &Delivery) -> Result<(), QueueError> {
        // The claim already removed the item; successful items are discarded.
        Ok(())
    }

    fn fail(&self, delivery: Delivery, error: &str, now: DateTime<Utc>) -> Result<(), QueueError> {
        let mut con = self.connection.lock().unwrap();

        if delivery.policy.should_retry(delivery.attempt) {
            let next_attempt = delivery.attempt + 1;
            let delay = Duration::from_std(delivery.policy.delay_for_attempt(next_attempt))
                .unwrap_or_else(|_| Duration::zero());
            let due = (now + delay).timestamp_millis();

            let redelivery = Delivery {
                attempt: next_attempt,
                ..delivery
            };
            debug!(job_id = %redelivery.item.job_id, next_attempt, due, "scheduling redelivery");
            let _: () = con
                .zadd(&self.delayed_key, encode(&redelivery)?, due)
                .map_err(to_queue_error)?;
        } else {
            let parked = ParkedItem {
                attempts: delivery.attempt,
                item: delivery.item,
                last_error: error.to_string(),
                parked_at: now,
            };
            debug!(job_id = %parked.item.job_id, attempts = parked.attempts, "parking work item");
            let _: () = con
                .lpush(&self.parked_key, encode(&parked)?)
                .map_err(to_queue_error)?;
        }
        Ok(())
    }

    fn parked(&self) -> Result<Vec<ParkedItem>, QueueError> {
        let mut con = self.connection.lock().unwrap();
        let raw: Vec<String> = con
            .lrange(&self.parked_key, 0, -1)
            .map_err(to_queue_error)?;
        raw.iter().map(|r| decode(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobhub_jobs::JobId;

    // Requires a live Redis; run with `cargo test -p jobhub-infra --features redis -- --ignored`
    // and REDIS_URL pointing at it.
    #[test]
    #[ignore]
    fn round_trip_against_live_redis() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        let queue = RedisWorkQueue::connect(&url, &format!("jobhub-test:{}", uuid::Uuid::now_v7()))
            .unwrap();
        let now = Utc::now();

        let item = WorkItem {
            job_id: JobId::new(),
            payload: serde_json::json!({"x": 1}),
        };
        queue.enqueue(item.clone(), RetryPolicy::default()).unwrap();

        let delivery = queue.next_ready(now).unwrap().unwrap();
        assert_eq!(delivery.item, item);
        assert_eq!(delivery.attempt, 1);
        assert!(queue.next_ready(now).unwrap().is_none());
    }
}
