//! Transport secrets, read from a `.env`-style file with the process
//! environment as fallback.

use std::collections::BTreeMap;
use std::path::Path;

use svcwatch_shared::service_spec::EmailProvider;
use tracing::debug;

use super::ConfigError;

const SENDGRID_KEYS: [&str; 3] = ["SENDGRID_API_KEY", "SENDGRID_FROM", "SENDGRID_TO"];
const SMTP_KEYS: [&str; 8] = [
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_USER",
    "SMTP_PASSWORD",
    "SMTP_FROM",
    "SMTP_TO",
    "SMTP_TLS",
    "SMTP_SSL",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendGridSettings {
    pub api_key: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: String,
    /// STARTTLS on a plain connection.
    pub starttls: bool,
    /// Implicit TLS from the first byte; takes precedence over `starttls`.
    pub ssl: bool,
}

impl Credentials {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn parse_env(contents: &str) -> Self {
        let mut values = BTreeMap::new();
        for raw_line in contents.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            values.insert(
                key.trim().to_string(),
                value.trim().trim_matches('"').to_string(),
            );
        }
        Self { values }
    }

    /// Reads `path` when given and present; an absent file yields no keys.
    pub fn load_env_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!("Credentials file {:?} not found, relying on environment", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse_env(&contents))
    }

    /// File values first, then the known transport keys from the process
    /// environment for anything the file left out.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut creds = Self::load_env_file(path)?;
        creds.fill_from(SENDGRID_KEYS.iter().chain(SMTP_KEYS.iter()).filter_map(|k| {
            std::env::var(k).ok().map(|v| (k.to_string(), v))
        }));
        Ok(creds)
    }

    pub fn fill_from<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in pairs {
            self.values.entry(k).or_insert(v);
        }
    }

    /// Non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    pub fn sendgrid(&self) -> Result<SendGridSettings, ConfigError> {
        let missing: Vec<String> = SENDGRID_KEYS
            .iter()
            .filter(|k| self.get(k).is_none())
            .map(|k| k.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingCredentials {
                provider: EmailProvider::SendGrid,
                keys: missing,
            });
        }

        Ok(SendGridSettings {
            api_key: self.get("SENDGRID_API_KEY").unwrap_or_default().to_string(),
            from: self.get("SENDGRID_FROM").unwrap_or_default().to_string(),
            to: self.get("SENDGRID_TO").unwrap_or_default().to_string(),
        })
    }

    pub fn smtp(&self) -> Result<SmtpSettings, ConfigError> {
        let user = self.get("SMTP_USER").map(str::to_string);
        let from = self.get("SMTP_FROM").map(str::to_string).or(user.clone());

        let mut missing = Vec::new();
        if self.get("SMTP_HOST").is_none() {
            missing.push("SMTP_HOST".to_string());
        }
        if self.get("SMTP_TO").is_none() {
            missing.push("SMTP_TO".to_string());
        }
        if from.is_none() {
            missing.push("SMTP_FROM".to_string());
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingCredentials {
                provider: EmailProvider::Smtp,
                keys: missing,
            });
        }

        let port = match self.get("SMTP_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidCredential {
                key: "SMTP_PORT".to_string(),
                reason: e.to_string(),
            })?,
            None => 587,
        };

        Ok(SmtpSettings {
            host: self.get("SMTP_HOST").unwrap_or_default().to_string(),
            port,
            user,
            password: self.get("SMTP_PASSWORD").map(str::to_string),
            from: from.unwrap_or_default(),
            to: self.get("SMTP_TO").unwrap_or_default().to_string(),
            starttls: self.flag("SMTP_TLS", true),
            ssl: self.flag("SMTP_SSL", false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_skips_noise_and_strips_quotes() {
        let creds = Credentials::parse_env(
            "# comment\n\nSENDGRID_API_KEY = \"abc\"\nnot a pair\nSENDGRID_TO=ops@example.com\nURL=a=b\n",
        );
        assert_eq!(creds.get("SENDGRID_API_KEY"), Some("abc"));
        assert_eq!(creds.get("SENDGRID_TO"), Some("ops@example.com"));
        assert_eq!(creds.get("URL"), Some("a=b"));
        assert_eq!(creds.get("not a pair"), None);
    }

    #[test]
    fn test_missing_env_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let creds = Credentials::load_env_file(Some(&dir.path().join("nope.env"))).unwrap();
        assert_eq!(creds, Credentials::default());
    }

    #[test]
    fn test_fill_from_does_not_override_file_values() {
        let mut creds = Credentials::from_pairs([("SMTP_HOST", "file.example.com")]);
        creds.fill_from([
            ("SMTP_HOST".to_string(), "env.example.com".to_string()),
            ("SMTP_TO".to_string(), "ops@example.com".to_string()),
        ]);
        assert_eq!(creds.get("SMTP_HOST"), Some("file.example.com"));
        assert_eq!(creds.get("SMTP_TO"), Some("ops@example.com"));
    }

    #[test]
    fn test_sendgrid_reports_every_missing_key() {
        let creds = Credentials::from_pairs([("SENDGRID_FROM", "me@example.com")]);
        match creds.sendgrid().unwrap_err() {
            ConfigError::MissingCredentials { provider, keys } => {
                assert_eq!(provider, EmailProvider::SendGrid);
                assert_eq!(keys, vec!["SENDGRID_API_KEY", "SENDGRID_TO"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let creds = Credentials::from_pairs([
            ("SENDGRID_API_KEY", ""),
            ("SENDGRID_FROM", "a@example.com"),
            ("SENDGRID_TO", "b@example.com"),
        ]);
        match creds.sendgrid().unwrap_err() {
            ConfigError::MissingCredentials { keys, .. } => assert_eq!(keys, vec!["SENDGRID_API_KEY"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_smtp_defaults_and_from_fallback() {
        let creds = Credentials::from_pairs([
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_TO", "ops@example.com"),
            ("SMTP_USER", "robot@example.com"),
        ]);
        let smtp = creds.smtp().unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from, "robot@example.com");
        assert!(smtp.starttls);
        assert!(!smtp.ssl);
        assert_eq!(smtp.password, None);
    }

    #[test]
    fn test_smtp_requires_host_to_and_sender() {
        let creds = Credentials::default();
        match creds.smtp().unwrap_err() {
            ConfigError::MissingCredentials { keys, .. } => {
                assert_eq!(keys, vec!["SMTP_HOST", "SMTP_TO", "SMTP_FROM"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_smtp_bad_port() {
        let creds = Credentials::from_pairs([
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_TO", "ops@example.com"),
            ("SMTP_FROM", "robot@example.com"),
            ("SMTP_PORT", "smtp"),
        ]);
        assert!(matches!(
            creds.smtp(),
            Err(ConfigError::InvalidCredential { .. })
        ));
    }

    #[test]
    fn test_smtp_flags() {
        let creds = Credentials::from_pairs([
            ("SMTP_HOST", "mail.example.com"),
            ("SMTP_TO", "ops@example.com"),
            ("SMTP_FROM", "robot@example.com"),
            ("SMTP_PORT", "465"),
            ("SMTP_TLS", "FALSE"),
            ("SMTP_SSL", "True"),
        ]);
        let smtp = creds.smtp().unwrap();
        assert_eq!(smtp.port, 465);
        assert!(!smtp.starttls);
        assert!(smtp.ssl);
    }
}
