use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

fn default_check_interval_seconds() -> u64 {
    30
}

fn default_failures_before_restart() -> u32 {
    2
}

fn default_failures_before_alert() -> u32 {
    3
}

/// Per-service monitoring policy as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Minimum seconds between two probes. 0 probes on every pass.
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: u64,
    /// Streak length at which the restart fires, once per streak.
    #[serde(default = "default_failures_before_restart")]
    pub failures_before_restart: u32,
    /// Streak length from which an alert is due, once per streak.
    #[serde(default = "default_failures_before_alert")]
    pub failures_before_alert: u32,
    /// Run in order right after a restart, best effort.
    #[serde(
        default,
        alias = "post_restart_actions",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub post_restart_commands: Vec<CommandSpec>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval_seconds(),
            failures_before_restart: default_failures_before_restart(),
            failures_before_alert: default_failures_before_alert(),
            post_restart_commands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    /// executed as: /bin/sh -c "<string>"
    Sh(String),
    /// execve-style argv
    Argv(Vec<String>),
}

impl Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandSpec::Sh(cmd) => write!(f, "sh -c {}", cmd),
            CommandSpec::Argv(args) => write!(f, "{}", args.join(" ")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EmailProvider {
    #[default]
    SendGrid,
    Smtp,
}

impl EmailProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailProvider::SendGrid => "sendgrid",
            EmailProvider::Smtp => "smtp",
        }
    }
}

impl Display for EmailProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl Display for UnknownProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unsupported email provider '{}' (expected 'sendgrid' or 'smtp')",
            self.0
        )
    }
}

impl std::error::Error for UnknownProvider {}

impl FromStr for EmailProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sendgrid" => Ok(EmailProvider::SendGrid),
            "smtp" => Ok(EmailProvider::Smtp),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

impl TryFrom<String> for EmailProvider {
    type Error = UnknownProvider;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EmailProvider> for String {
    fn from(value: EmailProvider) -> Self {
        value.as_str().to_string()
    }
}

pub mod duration_human {
    use serde::{
        Deserializer, Serializer,
        de::{self, Visitor},
    };
    use std::fmt;
    use std::time::Duration;

    pub fn serialize<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let secs = d.as_secs();

        if secs != 0 && secs % 3600 == 0 {
            s.serialize_str(&format!("{}h", secs / 3600))
        } else if secs != 0 && secs % 60 == 0 {
            s.serialize_str(&format!("{}m", secs / 60))
        } else {
            s.serialize_str(&format!("{}s", secs))
        }
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a duration like 10s, 5m, 2h or a number of seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_secs(v))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let (num, unit) = v
                    .trim()
                    .chars()
                    .partition::<String, _>(|c| c.is_ascii_digit());

                let value: u64 = num.parse().map_err(E::custom)?;

                let factor = match unit.as_str() {
                    "" | "s" => 1,
                    "m" => 60,
                    "h" => 3600,
                    _ => return Err(E::custom("invalid duration unit (use s, m, h)")),
                };

                value
                    .checked_mul(factor)
                    .map(Duration::from_secs)
                    .ok_or_else(|| E::custom("duration out of range"))
            }
        }

        d.deserialize_any(DurationVisitor)
    }
}
