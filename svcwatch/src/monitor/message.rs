use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error(
        "invalid time zone '{0}': expected an IANA identifier such as 'UTC' or 'Europe/Berlin'"
    )]
    InvalidTimeZone(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Alert,
    Recovered,
}

impl NoticeKind {
    pub fn tag(&self) -> &'static str {
        match self {
            NoticeKind::Alert => "ALERT",
            NoticeKind::Recovered => "RECOVERED",
        }
    }
}

impl Display for NoticeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub subject: String,
    pub body: String,
}

impl Notice {
    pub fn build(
        kind: NoticeKind,
        service_name: &str,
        host: &str,
        time_zone: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, MessageError> {
        Ok(Self {
            subject: format_subject(kind.tag(), service_name, host),
            body: format_body(kind.tag(), service_name, host, time_zone, now)?,
        })
    }
}

pub fn parse_time_zone(name: &str) -> Result<Tz, MessageError> {
    name.parse::<Tz>()
        .map_err(|_| MessageError::InvalidTimeZone(name.to_string()))
}

pub fn format_subject(prefix: &str, service_name: &str, host: &str) -> String {
    format!("[{}] {} on {}", prefix, service_name, host)
}

pub fn format_body(
    prefix: &str,
    service_name: &str,
    host: &str,
    time_zone: &str,
    now: DateTime<Utc>,
) -> Result<String, MessageError> {
    let tz = parse_time_zone(time_zone)?;
    let local = now.with_timezone(&tz);

    Ok(format!(
        "Service: {}\nHost: {}\nTime ({}): {}\nStatus: {}\n",
        service_name,
        host,
        time_zone,
        local.to_rfc3339(),
        prefix
    ))
}
