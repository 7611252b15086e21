use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials as SmtpAuth;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, error};

use super::{Notifier, NotifyError};
use crate::config::ConfigError;
use crate::config::credentials::SmtpSettings;

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    timeout: Duration,
}

fn parse_mailbox(key: &str, raw: &str) -> Result<Mailbox, ConfigError> {
    raw.parse::<Mailbox>()
        .map_err(|e| ConfigError::InvalidCredential {
            key: key.to_string(),
            reason: format!("'{raw}': {e}"),
        })
}

impl SmtpNotifier {
    /// Addresses and the relay are checked here, so a broken setup fails at
    /// startup instead of at the first alert.
    pub fn new(settings: SmtpSettings, timeout: Duration) -> Result<Self, ConfigError> {
        let from = parse_mailbox("SMTP_FROM", &settings.from)?;
        let to = parse_mailbox("SMTP_TO", &settings.to)?;

        let builder = if settings.ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        } else if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        } else {
            Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                &settings.host,
            ))
        }
        .map_err(|e| ConfigError::InvalidCredential {
            key: "SMTP_HOST".to_string(),
            reason: e.to_string(),
        })?;

        let mut builder = builder.port(settings.port).timeout(Some(timeout));
        if let (Some(user), Some(password)) = (settings.user, settings.password) {
            builder = builder.credentials(SmtpAuth::new(user, password));
        }

        debug!(
            "SMTP transport for {}:{} (ssl={}, starttls={})",
            settings.host, settings.port, settings.ssl, settings.starttls
        );

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            timeout,
        })
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = self.build_message(subject, body)?;

        match tokio::time::timeout(self.timeout, self.transport.send(message)).await {
            Ok(Ok(resp)) => {
                debug!("SMTP accepted message '{}' ({:?})", subject, resp.code());
                Ok(())
            }
            Ok(Err(e)) => {
                error!("SMTP delivery failed: {}", e);
                Err(NotifyError::Smtp(e.to_string()))
            }
            Err(_) => Err(NotifyError::Smtp(format!(
                "timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "127.0.0.1".to_string(),
            port: 2525,
            user: None,
            password: None,
            from: "monitor@example.com".to_string(),
            to: "ops@example.com".to_string(),
            starttls: false,
            ssl: false,
        }
    }

    #[tokio::test]
    async fn test_invalid_from_address_rejected() {
        let mut s = settings();
        s.from = "not an address".to_string();
        match SmtpNotifier::new(s, Duration::from_secs(1)) {
            Err(ConfigError::InvalidCredential { key, .. }) => assert_eq!(key, "SMTP_FROM"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[tokio::test]
    async fn test_invalid_to_address_rejected() {
        let mut s = settings();
        s.to = "@".to_string();
        assert!(matches!(
            SmtpNotifier::new(s, Duration::from_secs(1)),
            Err(ConfigError::InvalidCredential { .. })
        ));
    }

    #[tokio::test]
    async fn test_message_headers() {
        let n = SmtpNotifier::new(settings(), Duration::from_secs(1)).unwrap();
        let msg = n
            .build_message("[ALERT] nginx on web-1", "Service: nginx\n")
            .unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("From: monitor@example.com"));
        assert!(raw.contains("To: ops@example.com"));
        assert!(raw.contains("Subject: [ALERT] nginx on web-1"));
        assert!(raw.contains("Content-Type: text/plain"));
    }

    #[tokio::test]
    async fn test_send_to_closed_port_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut s = settings();
        s.port = port;
        let n = SmtpNotifier::new(s, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            n.send("subject", "body").await,
            Err(NotifyError::Smtp(_))
        ));
    }
}
