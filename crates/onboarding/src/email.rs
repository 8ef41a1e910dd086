//! Email sending boundary.

use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email dispatch failed: {0}")]
    Dispatch(String),
}

/// Outbound email contract.
///
/// Failures must not be swallowed: the OTP engine propagates them to the
/// caller instead of retrying internally.
pub trait EmailSender: Send + Sync {
    fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError>;
}

impl<T: EmailSender + ?Sized> EmailSender for std::sync::Arc<T> {
    fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError> {
        (**self).send(to, subject, html)
    }
}

/// Dev sender: logs the mail instead of delivering it.
#[derive(Debug, Default)]
pub struct ConsoleEmailSender;

impl EmailSender for ConsoleEmailSender {
    fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError> {
        tracing::info!(to, subject, body = html, "outbound email (console sender)");
        Ok(())
    }
}

/// A captured outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// In-memory sender for tests/dev: records every mail it is asked to send.
#[derive(Debug, Default)]
pub struct MemoryEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl MemoryEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// The most recently captured mail, if any.
    pub fn last(&self) -> Option<SentEmail> {
        self.sent.lock().unwrap().last().cloned()
    }
}

impl EmailSender for MemoryEmailSender {
    fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}
