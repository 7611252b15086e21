use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error};

use super::{Notifier, NotifyError};
use crate::config::ConfigError;
use crate::config::credentials::SendGridSettings;

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

pub struct SendGridNotifier {
    client: reqwest::Client,
    endpoint: String,
    settings: SendGridSettings,
    timeout: Duration,
}

impl SendGridNotifier {
    pub fn new(settings: SendGridSettings, timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: SENDGRID_ENDPOINT.to_string(),
            settings,
            timeout,
        })
    }

    /// Points the notifier at another API base, e.g. a regional endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn payload(&self, subject: &str, body: &str) -> Value {
        json!({
            "personalizations": [{ "to": [{ "email": self.settings.to }] }],
            "from": { "email": self.settings.from },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": body }],
        })
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.settings.api_key)
            .timeout(self.timeout)
            .json(&self.payload(subject, body))
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() >= 300 {
            let text = resp.text().await.unwrap_or_default();
            error!("SendGrid request failed with status {}: {}", status, text);
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!("SendGrid accepted message '{}' ({})", subject, status);
        Ok(())
    }
}
