//! `jobhub-infra` — production adapters behind the domain trait boundaries.
//!
//! - [`email`]: SMTP-backed [`jobhub_onboarding::EmailSender`]
//! - [`queue`]: Redis-backed [`jobhub_jobs::WorkQueue`] (feature `redis`)

pub mod email;
#[cfg(feature = "redis")]
pub mod queue;

pub use email::{SmtpConfig, SmtpEmailSender};
#[cfg(feature = "redis")]
pub use queue::RedisWorkQueue;
