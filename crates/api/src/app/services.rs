//! Dependency wiring: stores, engines, and the executor pool.
//!
//! Handles are constructed here and passed into each engine explicitly;
//! lifecycle (executor spawn/shutdown) is owned by this module, not by the
//! engines.

use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::Duration;

use jobhub_auth::{BcryptPasswordHasher, Hs256TokenSigner, PasswordHasher, TokenSigner};
use jobhub_jobs::{
    InMemoryJobStore, InMemoryWorkQueue, JobExecutor, JobExecutorConfig, JobExecutorHandle,
    JobHandler, JobSubmission, RetryPolicy, WorkItem,
};
use jobhub_onboarding::{
    AccountOnboarding, EmailSender, InMemoryOtpStore, InMemoryUserStore, OnboardingConfig,
    OtpConfig, OtpEngine,
};
use jobhub_projects::InMemoryProjectStore;

use crate::config::AppConfig;

type Onboarding =
    AccountOnboarding<Arc<InMemoryUserStore>, Arc<InMemoryOtpStore>, Arc<dyn EmailSender>>;
type Jobs = JobSubmission<Arc<InMemoryJobStore>, Arc<InMemoryWorkQueue>>;

/// Everything the HTTP layer needs, wired once at startup.
pub struct AppServices {
    pub onboarding: Onboarding,
    pub jobs: Jobs,
    pub users: Arc<InMemoryUserStore>,
    pub projects: Arc<InMemoryProjectStore>,
    pub signer: Arc<Hs256TokenSigner>,
    executor: Option<JobExecutorHandle>,
}

impl AppServices {
    /// Wire the in-memory stores, the engines, and spawn the executor pool.
    pub fn build(config: &AppConfig, mailer: Arc<dyn EmailSender>) -> Arc<Self> {
        let users = Arc::new(InMemoryUserStore::new());
        let otp_store = Arc::new(InMemoryOtpStore::new());
        let job_store = Arc::new(InMemoryJobStore::new());
        let queue = Arc::new(InMemoryWorkQueue::new());
        let projects = Arc::new(InMemoryProjectStore::new());

        let signer = Arc::new(Hs256TokenSigner::new(config.jwt_secret.as_bytes()));
        let hasher: Arc<dyn PasswordHasher> =
            Arc::new(BcryptPasswordHasher::with_cost(config.bcrypt_cost));

        let onboarding = AccountOnboarding::new(
            users.clone(),
            OtpEngine::new(otp_store, mailer, OtpConfig::default()),
            hasher,
            signer.clone() as Arc<dyn TokenSigner>,
            OnboardingConfig {
                token_lifetime: Duration::minutes(config.access_token_lifetime_min),
            },
        );

        let jobs = JobSubmission::new(job_store.clone(), queue.clone(), RetryPolicy::default());

        let executor = JobExecutor::new(
            job_store,
            queue,
            simulated_handler(StdDuration::from_millis(config.simulated_execution_ms)),
        )
        .spawn(
            JobExecutorConfig::default()
                .with_workers(config.worker_count)
                .with_execution_timeout(StdDuration::from_secs(config.execution_timeout_secs)),
        );

        Arc::new(Self {
            onboarding,
            jobs,
            users,
            projects,
            signer,
            executor: Some(executor),
        })
    }
}

impl Drop for AppServices {
    fn drop(&mut self) {
        if let Some(handle) = self.executor.take() {
            handle.shutdown();
        }
    }
}

/// Built-in payload handler: sleeps for the configured delay and echoes the
/// input back as the result.
fn simulated_handler(delay: StdDuration) -> JobHandler {
    Arc::new(move |item: &WorkItem| {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Ok(serde_json::json!({
            "output": "execution successful",
            "input": item.payload,
        }))
    })
}
