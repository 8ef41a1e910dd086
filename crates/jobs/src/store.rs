//! Job storage.
//!
//! The idempotency key is enforced unique at insert time, which is what makes
//! concurrent duplicate submissions resolve to a single record. Status
//! transitions are unconditional single-record writes: the executor owns
//! them, and last write wins (see the redelivery caveat on
//! [`crate::executor::JobExecutor`]).

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::types::{JobId, JobRecord};

#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("idempotency key already taken")]
    DuplicateIdempotencyKey,
    #[error("storage error: {0}")]
    Storage(String),
}

/// Job persistence abstraction.
pub trait JobStore: Send + Sync {
    /// Persist a new job. Fails with [`JobStoreError::DuplicateIdempotencyKey`]
    /// when the key is already taken.
    fn insert(&self, job: JobRecord) -> Result<(), JobStoreError>;

    fn find_by_id(&self, id: JobId) -> Result<Option<JobRecord>, JobStoreError>;

    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<JobRecord>, JobStoreError>;

    /// Unconditionally move the job to Processing.
    fn mark_processing(&self, id: JobId, now: DateTime<Utc>) -> Result<(), JobStoreError>;

    /// Move the job to Completed and store the result (clears any error).
    fn complete(
        &self,
        id: JobId,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), JobStoreError>;

    /// Move the job to Failed and store the error description (clears any
    /// result).
    fn fail(&self, id: JobId, error: String, now: DateTime<Utc>) -> Result<(), JobStoreError>;
}

impl<T: JobStore + ?Sized> JobStore for std::sync::Arc<T> {
    fn insert(&self, job: JobRecord) -> Result<(), JobStoreError> {
        (**self).insert(job)
    }

    fn find_by_id(&self, id: JobId) -> Result<Option<JobRecord>, JobStoreError> {
        (**self).find_by_id(id)
    }

    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<JobRecord>, JobStoreError> {
        (**self).find_by_idempotency_key(key)
    }

    fn mark_processing(&self, id: JobId, now: DateTime<Utc>) -> Result<(), JobStoreError> {
        (**self).mark_processing(id, now)
    }

    fn complete(
        &self,
        id: JobId,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), JobStoreError> {
        (**self).complete(id, result, now)
    }

    fn fail(&self, id: JobId, error: String, now: DateTime<Utc>) -> Result<(), JobStoreError> {
        (**self).fail(id, error, now)
    }
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    inner: RwLock<JobRows>,
}

#[derive(Debug, Default)]
struct JobRows {
    jobs: HashMap<JobId, JobRecord>,
    by_key: HashMap<String, JobId>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: JobRecord) -> Result<(), JobStoreError> {
        let mut rows = self.inner.write().unwrap();
        if rows.by_key.contains_key(&job.idempotency_key) {
            return Err(JobStoreError::DuplicateIdempotencyKey);
        }
        rows.by_key.insert(job.idempotency_key.clone(), job.id);
        rows.jobs.insert(job.id, job);
        Ok(())
    }

    fn find_by_id(&self, id: JobId) -> Result<Option<JobRecord>, JobStoreError> {
        Ok(self.inner.read().unwrap().jobs.get(&id).cloned())
    }

    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<JobRecord>, JobStoreError> {
        let rows = self.inner.read().unwrap();
        Ok(rows
            .by_key
            .get(key)
            .and_then(|id| rows.jobs.get(id))
            .cloned())
    }

    fn mark_processing(&self, id: JobId, now: DateTime<Utc>) -> Result<(), JobStoreError> {
        let mut rows = self.inner.write().unwrap();
        let job = rows.jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.set_processing(now);
        Ok(())
    }

    fn complete(
        &self,
        id: JobId,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), JobStoreError> {
        let mut rows = self.inner.write().unwrap();
        let job = rows.jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.set_completed(result, now);
        Ok(())
    }

    fn fail(&self, id: JobId, error: String, now: DateTime<Utc>) -> Result<(), JobStoreError> {
        let mut rows = self.inner.write().unwrap();
        let job = rows.jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.set_failed(error, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;
    use jobhub_core::UserId;

    fn job(user: UserId, key: &str) -> JobRecord {
        JobRecord::new(user, key.into(), serde_json::json!({"x": 1}), Utc::now())
    }

    #[test]
    fn insert_enforces_unique_idempotency_key() {
        let store = InMemoryJobStore::new();
        let user = UserId::new();

        store.insert(job(user, "k1")).unwrap();
        assert!(matches!(
            store.insert(job(user, "k1")),
            Err(JobStoreError::DuplicateIdempotencyKey)
        ));
    }

    #[test]
    fn lookup_by_key_returns_the_original_record() {
        let store = InMemoryJobStore::new();
        let user = UserId::new();
        let j = job(user, "k1");
        let id = j.id;
        store.insert(j).unwrap();

        let found = store.find_by_idempotency_key("k1").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(store.find_by_idempotency_key("k2").unwrap().is_none());
    }

    #[test]
    fn transitions_overwrite_unconditionally() {
        let store = InMemoryJobStore::new();
        let user = UserId::new();
        let j = job(user, "k1");
        let id = j.id;
        store.insert(j).unwrap();
        let now = Utc::now();

        store.mark_processing(id, now).unwrap();
        store.complete(id, serde_json::json!({"ok": true}), now).unwrap();
        assert_eq!(store.find_by_id(id).unwrap().unwrap().status, JobStatus::Completed);

        // A stale redelivery may drag a terminal job back to Processing;
        // the store does not guard against it (documented weakness).
        store.mark_processing(id, now).unwrap();
        assert_eq!(store.find_by_id(id).unwrap().unwrap().status, JobStatus::Processing);
    }

}
