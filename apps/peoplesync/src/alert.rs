//! Alert e-mail over SMTP.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use peoplesync_engine::alert::{Alert, AlertError, AlertSink, LogAlertSink};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::config::{SmtpConfig, SmtpSecurity};

/// Sends each alert as one plain-text e-mail to every configured recipient.
pub struct SmtpAlertSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl std::fmt::Debug for SmtpAlertSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpAlertSink")
            .field("from", &self.from.to_string())
            .field("recipients", &self.to.len())
            .finish()
    }
}

impl SmtpAlertSink {
    /// Build the transport. No connection is made until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self, AlertError> {
        config.validate().map_err(AlertError::configuration)?;

        let from = parse_mailbox(&config.from)?;
        let to = config
            .to
            .iter()
            .map(|address| parse_mailbox(address))
            .collect::<Result<Vec<_>, _>>()?;

        let builder = match config.security {
            SmtpSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| AlertError::configuration(format!("invalid SMTP relay: {e}")))?
            }
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| AlertError::configuration(format!("invalid SMTP relay: {e}")))?,
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));
        if let Some(username) = &config.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                config.password.clone().unwrap_or_default(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    /// Compose the e-mail for `alert`.
    pub fn message(&self, alert: &Alert) -> Result<Message, AlertError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(alert.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for mailbox in &self.to {
            builder = builder.to(mailbox.clone());
        }

        let body = format!(
            "{}\nRun: {}\nRaised at: {}\n",
            alert.body,
            alert.run_id,
            alert.raised_at.to_rfc3339()
        );
        builder
            .body(body)
            .map_err(|e| AlertError::configuration(format!("unable to build alert e-mail: {e}")))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, AlertError> {
    address
        .parse()
        .map_err(|e| AlertError::configuration(format!("invalid e-mail address '{address}': {e}")))
}

#[async_trait]
impl AlertSink for SmtpAlertSink {
    #[instrument(skip(self, alert), fields(subject = %alert.subject, recipients = self.to.len()))]
    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        let message = self.message(alert)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| AlertError::transport(e.to_string()))?;

        info!(run_id = %alert.run_id, "Alert e-mail sent");
        Ok(())
    }
}

/// Pick the alert sink for this run: SMTP when configured, the log otherwise.
pub fn build_alert_sink(config: Option<&SmtpConfig>) -> Result<Arc<dyn AlertSink>, AlertError> {
    match config {
        Some(smtp) => Ok(Arc::new(SmtpAlertSink::new(smtp)?)),
        None => {
            warn!("No alert transport configured; alerts will only be logged");
            Ok(Arc::new(LogAlertSink))
        }
    }
}
