//! Listing notifications
//!
//! Sellers are emailed when their listing is created, approved or rejected.
//! Delivery is fire-and-forget: `send` never fails the caller, problems are
//! only logged.

use anyhow::{anyhow, Result};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::MailConfig;

/// Outgoing notification channel
pub trait Notifier: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str);
}

/// Build the notifier described by the mail configuration.
///
/// Disabled mail (or no SMTP host) falls back to [`LogNotifier`].
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Notifier>> {
    if !config.enabled || config.smtp_host.is_empty() {
        tracing::info!("Mail delivery disabled, notifications will only be logged");
        return Ok(Arc::new(LogNotifier));
    }
    Ok(Arc::new(SmtpNotifier::new(config)?))
}

/// Writes notifications to the log instead of sending them
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, to: &str, subject: &str, _body: &str) {
        tracing::info!(to = %to, subject = %subject, "Notification (mail disabled)");
    }
}

/// Sends notifications through an SMTP relay
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from)
            .parse()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) {
        let message = match self.build_message(to, subject, body) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(to = %to, "Skipping notification: {}", e);
                return;
            }
        };

        let mailer = self.mailer.clone();
        let to = to.to_string();
        tokio::spawn(async move {
            match mailer.send(message).await {
                Ok(_) => tracing::debug!(to = %to, "Notification sent"),
                Err(e) => tracing::warn!(to = %to, "Failed to send notification: {}", e),
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Notifier;
    use std::sync::Mutex;

    /// Records every notification for assertions
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String, String)>>,
    }

    impl RecordingNotifier {
        pub fn sent(&self) -> Vec<(String, String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, to: &str, subject: &str, body: &str) {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
        }
    }
}
