//! `jobhub-jobs` — idempotent job submission and asynchronous execution.
//!
//! Submission persists a job keyed by a client-supplied idempotency key and
//! enqueues a work item; the executor consumes deliveries from the queue with
//! a bounded worker pool and drives each job forward along
//! Pending → Processing → {Completed | Failed}. The queue owns redelivery:
//! failures propagate back to it and its retry policy decides what happens
//! next.

pub mod executor;
pub mod queue;
pub mod store;
pub mod submit;
pub mod types;

pub use executor::{ExecutorStats, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobHandler};
pub use queue::{Delivery, InMemoryWorkQueue, ParkedItem, QueueError, WorkItem, WorkQueue};
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
pub use submit::{JobError, JobSubmission, SubmitOutcome};
pub use types::{BackoffStrategy, JobId, JobRecord, JobStatus, RetryPolicy};
