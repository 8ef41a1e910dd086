use std::sync::Arc;

use jobhub_api::app::{AppServices, build_app};
use jobhub_api::config::AppConfig;
use jobhub_infra::{SmtpConfig, SmtpEmailSender};
use jobhub_onboarding::{ConsoleEmailSender, EmailSender};

#[tokio::main]
async fn main() {
    jobhub_observability::init();

    let config = AppConfig::from_env();

    let mailer: Arc<dyn EmailSender> = match SmtpConfig::from_env() {
        Some(smtp) => match SmtpEmailSender::new(smtp) {
            Ok(sender) => Arc::new(sender),
            Err(e) => {
                tracing::warn!(error = %e, "SMTP setup failed; falling back to console sender");
                Arc::new(ConsoleEmailSender)
            }
        },
        None => {
            tracing::warn!("SMTP not configured; OTP codes will be logged, not delivered");
            Arc::new(ConsoleEmailSender)
        }
    };

    let services = AppServices::build(&config, mailer);
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .unwrap_or_else(|e| panic!("failed to bind 0.0.0.0:{}: {e}", config.port));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
