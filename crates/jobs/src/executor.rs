//! Worker-pool job executor.
//!
//! Consumes deliveries from the work queue and drives each job through its
//! lifecycle. Redelivery of the same job id is not mutually exclusive with an
//! in-flight attempt for that id: the status field is the only
//! synchronization point and last write wins. In particular a stale
//! redelivery can drag a terminal job back through Processing — a documented
//! weakness, deliberately not corrected here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::queue::{Delivery, WorkItem, WorkQueue};
use crate::store::JobStore;

/// Payload execution function.
///
/// The executor is agnostic to what a job actually does; callers provide the
/// handler and the executor owns the lifecycle bookkeeping around it.
pub type JobHandler = Arc<dyn Fn(&WorkItem) -> Result<serde_json::Value, String> + Send + Sync>;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// Bounded worker pool size.
    pub workers: usize,
    /// How often an idle worker polls the queue.
    pub poll_interval: Duration,
    /// Hard cap on a single payload execution; a breach surfaces as a Failed
    /// transition rather than an indefinite suspension.
    pub execution_timeout: Duration,
    /// Name for logging.
    pub name: String,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            poll_interval: Duration::from_millis(100),
            execution_timeout: Duration::from_secs(30),
            name: "job-executor".to_string(),
        }
    }
}

impl JobExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }
}

/// Executor runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutorStats {
    pub deliveries_processed: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
}

/// Handle to control a running executor pool.
pub struct JobExecutorHandle {
    shutdown: Arc<AtomicBool>,
    joins: Vec<thread::JoinHandle<()>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl JobExecutorHandle {
    /// Request graceful shutdown and wait for all workers to stop.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for join in self.joins.drain(..) {
            let _ = join.join();
        }
    }

    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().unwrap().clone()
    }
}

/// Queue consumer that executes job payloads.
pub struct JobExecutor<S: JobStore, Q: WorkQueue> {
    store: S,
    queue: Q,
    handler: JobHandler,
}

impl<S, Q> JobExecutor<S, Q>
where
    S: JobStore + Clone + Send + 'static,
    Q: WorkQueue + Clone + Send + 'static,
{
    pub fn new(store: S, queue: Q, handler: JobHandler) -> Self {
        Self {
            store,
            queue,
            handler,
        }
    }

    /// Spawn the bounded worker pool.
    pub fn spawn(self, config: JobExecutorConfig) -> JobExecutorHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Mutex::new(ExecutorStats::default()));

        info!(executor = %config.name, workers = config.workers, "job executor started");

        let joins = (0..config.workers.max(1))
            .map(|i| {
                let store = self.store.clone();
                let queue = self.queue.clone();
                let handler = self.handler.clone();
                let shutdown = shutdown.clone();
                let stats = stats.clone();
                let config = config.clone();

                thread::Builder::new()
                    .name(format!("{}-{}", config.name, i))
                    .spawn(move || {
                        worker_loop(store, queue, handler, config, shutdown, stats);
                    })
                    .expect("failed to spawn job executor worker thread")
            })
            .collect();

        JobExecutorHandle {
            shutdown,
            joins,
            stats,
        }
    }

    /// Process one delivery synchronously (used by the worker loop and by
    /// tests that drive the queue by hand).
    pub fn process_delivery(&self, delivery: Delivery, execution_timeout: Duration) {
        process_delivery(
            &self.store,
            &self.queue,
            &self.handler,
            delivery,
            execution_timeout,
        );
    }
}

fn worker_loop<S: JobStore, Q: WorkQueue>(
    store: S,
    queue: Q,
    handler: JobHandler,
    config: JobExecutorConfig,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Mutex<ExecutorStats>>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match queue.next_ready(Utc::now()) {
            Ok(Some(delivery)) => {
                let succeeded = process_delivery(
                    &store,
                    &queue,
                    &handler,
                    delivery,
                    config.execution_timeout,
                );

                let mut s = stats.lock().unwrap();
                s.deliveries_processed += 1;
                if succeeded {
                    s.deliveries_succeeded += 1;
                } else {
                    s.deliveries_failed += 1;
                }
            }
            Ok(None) => thread::sleep(config.poll_interval),
            Err(e) => {
                error!(executor = %config.name, error = %e, "failed to claim work item");
                thread::sleep(config.poll_interval);
            }
        }
    }

    debug!(executor = %config.name, "job executor worker stopped");
}

fn process_delivery<S: JobStore, Q: WorkQueue>(
    store: &S,
    queue: &Q,
    handler: &JobHandler,
    delivery: Delivery,
    execution_timeout: Duration,
) -> bool {
    let job_id = delivery.item.job_id;

    // Unconditional overwrite: at-least-once delivery means this can re-fire,
    // including on a job that already reached a terminal state.
    if let Err(e) = store.mark_processing(job_id, Utc::now()) {
        warn!(%job_id, error = %e, "failed to mark job processing");
    }

    match run_with_timeout(handler.clone(), delivery.item.clone(), execution_timeout) {
        Ok(result) => {
            if let Err(e) = store.complete(job_id, result, Utc::now()) {
                warn!(%job_id, error = %e, "failed to record job completion");
            }
            if let Err(e) = queue.ack(&delivery) {
                warn!(%job_id, error = %e, "failed to ack work item");
            }
            debug!(%job_id, attempt = delivery.attempt, "job completed");
            true
        }
        Err(err) => {
            if let Err(e) = store.fail(job_id, err.clone(), Utc::now()) {
                warn!(%job_id, error = %e, "failed to record job failure");
            }
            // Hand the failure back to the queue so its retry policy decides
            // whether this job gets another attempt.
            if let Err(e) = queue.fail(delivery, &err, Utc::now()) {
                warn!(%job_id, error = %e, "failed to report work item failure");
            }
            debug!(%job_id, error = %err, "job attempt failed");
            false
        }
    }
}

/// Run the handler on a scratch thread and give up after `timeout`.
///
/// On timeout the runaway execution is abandoned (its thread is left to
/// finish in the background) and the attempt is reported as failed.
fn run_with_timeout(
    handler: JobHandler,
    item: WorkItem,
    timeout: Duration,
) -> Result<serde_json::Value, String> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let _ = tx.send(handler(&item));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(format!(
            "execution timed out after {}ms",
            timeout.as_millis()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{InMemoryWorkQueue, WorkQueue};
    use crate::store::{InMemoryJobStore, JobStore};
    use crate::types::{JobRecord, JobStatus, RetryPolicy};
    use jobhub_core::UserId;

    fn setup(
        handler: JobHandler,
    ) -> (
        JobExecutor<Arc<InMemoryJobStore>, Arc<InMemoryWorkQueue>>,
        Arc<InMemoryJobStore>,
        Arc<InMemoryWorkQueue>,
    ) {
        let store = Arc::new(InMemoryJobStore::new());
        let queue = Arc::new(InMemoryWorkQueue::new());
        let executor = JobExecutor::new(store.clone(), queue.clone(), handler);
        (executor, store, queue)
    }

    fn seeded_job(store: &InMemoryJobStore, payload: serde_json::Value) -> JobRecord {
        let job = JobRecord::new(UserId::new(), "k1".into(), payload, Utc::now());
        store.insert(job.clone()).unwrap();
        job
    }

    fn drain<S, Q>(executor: &JobExecutor<S, Q>, queue: &Q)
    where
        S: JobStore + Clone + Send + 'static,
        Q: WorkQueue + Clone + Send + 'static,
    {
        while let Some(delivery) = queue.next_ready(Utc::now()).unwrap() {
            executor.process_delivery(delivery, Duration::from_secs(1));
        }
    }

    #[test]
    fn successful_execution_completes_the_job_and_acks() {
        let handler: JobHandler = Arc::new(|item: &WorkItem| {
            Ok(serde_json::json!({"output": "execution successful", "input": item.payload}))
        });
        let (executor, store, queue) = setup(handler);

        let job = seeded_job(&store, serde_json::json!({"x": 1}));
        queue
            .enqueue(
                WorkItem {
                    job_id: job.id,
                    payload: job.input.clone(),
                },
                RetryPolicy::fixed(3, Duration::ZERO),
            )
            .unwrap();

        drain(&executor, &queue);

        let done = store.find_by_id(job.id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.result.unwrap()["input"], serde_json::json!({"x": 1}));
        assert!(done.error.is_none());
        assert_eq!(queue.depth(), 0);
        assert!(queue.parked().unwrap().is_empty());
    }

    #[test]
    fn failing_execution_retries_until_parked() {
        let handler: JobHandler = Arc::new(|_: &WorkItem| Err("boom".to_string()));
        let (executor, store, queue) = setup(handler);

        let job = seeded_job(&store, serde_json::json!({}));
        queue
            .enqueue(
                WorkItem {
                    job_id: job.id,
                    payload: job.input.clone(),
                },
                RetryPolicy::fixed(3, Duration::ZERO),
            )
            .unwrap();

        drain(&executor, &queue);

        let failed = store.find_by_id(job.id).unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.result.is_none());

        let parked = queue.parked().unwrap();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].attempts, 3);
    }

    #[test]
    fn timeout_surfaces_as_failed_not_a_hang() {
        let handler: JobHandler = Arc::new(|_: &WorkItem| {
            thread::sleep(Duration::from_millis(500));
            Ok(serde_json::json!({}))
        });
        let (executor, store, queue) = setup(handler);

        let job = seeded_job(&store, serde_json::json!({}));
        queue
            .enqueue(
                WorkItem {
                    job_id: job.id,
                    payload: job.input.clone(),
                },
                RetryPolicy::fixed(1, Duration::ZERO),
            )
            .unwrap();

        let delivery = queue.next_ready(Utc::now()).unwrap().unwrap();
        executor.process_delivery(delivery, Duration::from_millis(20));

        let failed = store.find_by_id(job.id).unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.error.unwrap().contains("timed out"));
    }

    #[test]
    fn duplicate_delivery_of_a_completed_job_overwrites_last_write_wins() {
        // At-least-once delivery can hand a terminal job back to a worker.
        // This documents the observed behavior: the duplicate re-runs the
        // payload and overwrites the stored result, rather than being
        // rejected on a status precondition.
        let handler: JobHandler =
            Arc::new(|_: &WorkItem| Ok(serde_json::json!({"run": "again"})));
        let (executor, store, queue) = setup(handler);

        let job = seeded_job(&store, serde_json::json!({}));
        store
            .complete(job.id, serde_json::json!({"run": "first"}), Utc::now())
            .unwrap();

        queue
            .enqueue(
                WorkItem {
                    job_id: job.id,
                    payload: job.input.clone(),
                },
                RetryPolicy::fixed(1, Duration::ZERO),
            )
            .unwrap();
        drain(&executor, &queue);

        let after = store.find_by_id(job.id).unwrap().unwrap();
        assert_eq!(after.status, JobStatus::Completed);
        assert_eq!(after.result.unwrap(), serde_json::json!({"run": "again"}));
    }

    #[test]
    fn pool_executes_jobs_in_the_background() {
        let handler: JobHandler = Arc::new(|item: &WorkItem| {
            Ok(serde_json::json!({"echo": item.payload}))
        });
        let (executor, store, queue) = setup(handler);

        let job = seeded_job(&store, serde_json::json!({"n": 7}));
        queue
            .enqueue(
                WorkItem {
                    job_id: job.id,
                    payload: job.input.clone(),
                },
                RetryPolicy::default(),
            )
            .unwrap();

        let handle = executor.spawn(
            JobExecutorConfig::default()
                .with_name("test-executor")
                .with_workers(2),
        );

        for _ in 0..100 {
            if handle.stats().deliveries_processed >= 1 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        let stats = handle.stats();
        handle.shutdown();

        assert_eq!(stats.deliveries_succeeded, 1);
        let done = store.find_by_id(job.id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.result.unwrap()["echo"], serde_json::json!({"n": 7}));
    }
}
