//! SMTP email sender.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::debug;

use jobhub_onboarding::{EmailError, EmailSender};

/// SMTP connection settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server host (e.g. "smtp.resend.com").
    pub host: String,
    /// 465 for TLS, 587 for STARTTLS. Defaults to 465.
    pub port: u16,
    pub username: String,
    /// Password, or an API key for services that take one here.
    pub password: String,
    pub from_email: String,
}

impl SmtpConfig {
    /// Read settings from `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD`,
    /// `SMTP_FROM_EMAIL` and optionally `SMTP_PORT`. Returns `None` when any
    /// required variable is missing, in which case callers fall back to the
    /// console sender.
    pub fn from_env() -> Option<Self> {
        fn get(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|s| !s.is_empty())
        }

        Some(Self {
            host: get("SMTP_HOST")?,
            port: get("SMTP_PORT").and_then(|p| p.parse().ok()).unwrap_or(465),
            username: get("SMTP_USERNAME")?,
            password: get("SMTP_PASSWORD")?,
            from_email: get("SMTP_FROM_EMAIL")?,
        })
    }
}

/// Production [`EmailSender`] over SMTP.
pub struct SmtpEmailSender {
    transport: SmtpTransport,
    from_email: String,
}

impl SmtpEmailSender {
    pub fn new(config: SmtpConfig) -> Result<Self, EmailError> {
        let transport = SmtpTransport::relay(&config.host)
            .map_err(|e| EmailError::Dispatch(format!("smtp relay setup: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(config.username, config.password))
            .build();

        Ok(Self {
            transport,
            from_email: config.from_email,
        })
    }
}

impl EmailSender for SmtpEmailSender {
    fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e| EmailError::Dispatch(format!("bad from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| EmailError::Dispatch(format!("bad to address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| EmailError::Dispatch(format!("message build: {e}")))?;

        self.transport
            .send(&message)
            .map_err(|e| EmailError::Dispatch(e.to_string()))?;

        debug!(to, subject, "email dispatched via smtp");
        Ok(())
    }
}
