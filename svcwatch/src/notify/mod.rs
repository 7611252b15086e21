pub mod sendgrid;
pub mod smtp;

use async_trait::async_trait;
use std::time::Duration;
use svcwatch_shared::service_spec::EmailProvider;

use crate::config::{ConfigError, credentials::Credentials};

pub use sendgrid::SendGridNotifier;
pub use smtp::SmtpNotifier;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail API rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),
}

/// Delivery of one formatted message. Implementations bound their own I/O by
/// a timeout and never retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// The supported transports. Selected by `email_provider` in the config.
pub enum Transport {
    SendGrid(SendGridNotifier),
    Smtp(SmtpNotifier),
}

impl Transport {
    pub fn from_config(
        provider: EmailProvider,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        match provider {
            EmailProvider::SendGrid => Ok(Transport::SendGrid(SendGridNotifier::new(
                credentials.sendgrid()?,
                timeout,
            )?)),
            EmailProvider::Smtp => Ok(Transport::Smtp(SmtpNotifier::new(
                credentials.smtp()?,
                timeout,
            )?)),
        }
    }

    pub fn provider(&self) -> EmailProvider {
        match self {
            Transport::SendGrid(_) => EmailProvider::SendGrid,
            Transport::Smtp(_) => EmailProvider::Smtp,
        }
    }
}

#[async_trait]
impl Notifier for Transport {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        match self {
            Transport::SendGrid(n) => n.send(subject, body).await,
            Transport::Smtp(n) => n.send(subject, body).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_selects_sendgrid() {
        let creds = Credentials::from_pairs([
            ("SENDGRID_API_KEY", "key"),
            ("SENDGRID_FROM", "monitor@example.com"),
            ("SENDGRID_TO", "ops@example.com"),
        ]);
        let t = Transport::from_config(EmailProvider::SendGrid, &creds, Duration::from_secs(5))
            .unwrap();
        assert_eq!(t.provider(), EmailProvider::SendGrid);
    }

    #[tokio::test]
    async fn test_transport_selects_smtp() {
        let creds = Credentials::from_pairs([
            ("SMTP_HOST", "localhost"),
            ("SMTP_PORT", "2525"),
            ("SMTP_FROM", "monitor@example.com"),
            ("SMTP_TO", "ops@example.com"),
            ("SMTP_TLS", "false"),
        ]);
        let t = Transport::from_config(EmailProvider::Smtp, &creds, Duration::from_secs(5))
            .unwrap();
        assert_eq!(t.provider(), EmailProvider::Smtp);
    }

    #[test]
    fn test_transport_missing_credentials() {
        let err = Transport::from_config(
            EmailProvider::SendGrid,
            &Credentials::default(),
            Duration::from_secs(5),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::MissingCredentials { .. }));
    }
}
