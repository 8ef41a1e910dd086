//! Idempotent job submission.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use jobhub_core::UserId;

use crate::queue::{QueueError, WorkItem, WorkQueue};
use crate::store::{JobStore, JobStoreError};
use crate::types::{JobId, JobRecord, RetryPolicy};

#[derive(Debug, Clone, thiserror::Error)]
pub enum JobError {
    #[error("{0}")]
    BadRequest(String),

    #[error("job not found")]
    NotFound,

    #[error("access denied")]
    Forbidden,

    #[error("queue error: {0}")]
    Queue(String),

    #[error("storage error: {0}")]
    Store(String),
}

impl From<QueueError> for JobError {
    fn from(e: QueueError) -> Self {
        Self::Queue(e.to_string())
    }
}

impl From<JobStoreError> for JobError {
    fn from(e: JobStoreError) -> Self {
        Self::Store(e.to_string())
    }
}

/// Result of a submission: whether this call created the job or replayed an
/// earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(JobRecord),
    Replayed(JobRecord),
}

impl SubmitOutcome {
    pub fn job(&self) -> &JobRecord {
        match self {
            SubmitOutcome::Created(job) | SubmitOutcome::Replayed(job) => job,
        }
    }
}

/// Accepts job requests, enforces idempotency, persists, and enqueues.
pub struct JobSubmission<S: JobStore, Q: WorkQueue> {
    store: S,
    queue: Q,
    policy: RetryPolicy,
}

impl<S: JobStore, Q: WorkQueue> JobSubmission<S, Q> {
    pub fn new(store: S, queue: Q, policy: RetryPolicy) -> Self {
        Self {
            store,
            queue,
            policy,
        }
    }

    /// Submit a job under a client-supplied idempotency key.
    ///
    /// A replayed key returns the stored record unchanged — regardless of its
    /// current status and of whatever payload came with the replay — and
    /// never enqueues a second work item.
    ///
    /// Persist-then-enqueue is not transactional: when the enqueue fails the
    /// job stays Pending and orphaned, and the error is surfaced. Detecting
    /// stuck Pending jobs is left to operational tooling.
    pub fn submit(
        &self,
        user_id: UserId,
        idempotency_key: &str,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, JobError> {
        let key = idempotency_key.trim();
        if key.is_empty() {
            return Err(JobError::BadRequest(
                "idempotency key must not be empty".into(),
            ));
        }

        if let Some(existing) = self.store.find_by_idempotency_key(key)? {
            debug!(job_id = %existing.id, key, "idempotent replay");
            return Ok(SubmitOutcome::Replayed(existing));
        }

        let job = JobRecord::new(user_id, key.to_string(), payload.clone(), now);
        let job_id = job.id;

        match self.store.insert(job.clone()) {
            Ok(()) => {}
            // Two submissions raced on the same key; the store picked a
            // winner, return it.
            Err(JobStoreError::DuplicateIdempotencyKey) => {
                let existing = self
                    .store
                    .find_by_idempotency_key(key)?
                    .ok_or_else(|| JobError::Store("job vanished after key conflict".into()))?;
                return Ok(SubmitOutcome::Replayed(existing));
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.queue.enqueue(
            WorkItem {
                job_id,
                payload,
            },
            self.policy.clone(),
        ) {
            warn!(job_id = %job_id, error = %e, "enqueue failed; job left pending");
            return Err(e.into());
        }

        debug!(job_id = %job_id, key, "job queued");
        Ok(SubmitOutcome::Created(job))
    }

    /// Fetch a job with an ownership check (not full RBAC).
    pub fn get_status(&self, user_id: UserId, job_id: JobId) -> Result<JobRecord, JobError> {
        let job = self.store.find_by_id(job_id)?.ok_or(JobError::NotFound)?;

        if job.user_id != user_id {
            return Err(JobError::Forbidden);
        }
        Ok(job)
    }
}
