pub mod credentials;

use anyhow::Context;
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::BTreeMap, path::Path, path::PathBuf, time::Duration};
use svcwatch_shared::service_spec::{EmailProvider, ServiceConfig, duration_human};
use sysinfo::System;
use tracing::warn;

use crate::monitor::message::{MessageError, parse_time_zone};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("no services configured")]
    NoServices,

    #[error("service '{service}': {reason}")]
    InvalidService { service: String, reason: String },

    #[error(transparent)]
    TimeZone(#[from] MessageError),

    #[error("missing {provider} credentials: {}", .keys.join(", "))]
    MissingCredentials {
        provider: EmailProvider,
        keys: Vec<String>,
    },

    #[error("invalid credential {key}: {reason}")]
    InvalidCredential { key: String, reason: String },
}

fn default_state_path() -> PathBuf {
    PathBuf::from("/var/lib/svcwatch/state.json")
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_restart_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_action_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_notify_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_tick() -> Duration {
    Duration::from_secs(1)
}

/// A `null` service entry means "all defaults".
fn deserialize_services<'de, D>(d: D) -> Result<BTreeMap<String, ServiceConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<ServiceConfig>>> = Option::deserialize(d)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, cfg)| (name, cfg.unwrap_or_default()))
        .collect())
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default)]
    pub email_provider: EmailProvider,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// IANA zone used for timestamps in mail bodies.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// Overrides the host name reported in messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_probe_timeout", with = "duration_human")]
    pub probe_timeout: Duration,
    #[serde(default = "default_restart_timeout", with = "duration_human")]
    pub restart_timeout: Duration,
    #[serde(default = "default_action_timeout", with = "duration_human")]
    pub action_timeout: Duration,
    #[serde(default = "default_notify_timeout", with = "duration_human")]
    pub notify_timeout: Duration,
    /// Re-evaluation period of the watch loop.
    #[serde(default = "default_tick", with = "duration_human")]
    pub tick: Duration,
    #[serde(default, deserialize_with = "deserialize_services")]
    pub services: BTreeMap<String, ServiceConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            email_provider: EmailProvider::default(),
            state_path: default_state_path(),
            time_zone: default_time_zone(),
            host: None,
            probe_timeout: default_probe_timeout(),
            restart_timeout: default_restart_timeout(),
            action_timeout: default_action_timeout(),
            notify_timeout: default_notify_timeout(),
            tick: default_tick(),
            services: BTreeMap::new(),
        }
    }
}

impl MonitorConfig {
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("svcwatch").join("config.json"))
    }

    /// Loads and validates. Nothing is polled or persisted when this fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::parse(path, &contents)?;
        config.validate()?;
        Ok(config)
    }

    /// `.yaml`/`.yml` parse as YAML, everything else as JSON.
    pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        let parsed = if is_yaml {
            serde_yaml::from_str::<Self>(contents).map_err(|e| e.to_string())
        } else {
            serde_json::from_str::<Self>(contents).map_err(|e| e.to_string())
        };

        parsed.map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }

        for (name, svc) in &self.services {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidService {
                    service: name.clone(),
                    reason: "service name must not be empty".to_string(),
                });
            }
            if svc.failures_before_restart == 0 {
                return Err(ConfigError::InvalidService {
                    service: name.clone(),
                    reason: "failures_before_restart must be at least 1".to_string(),
                });
            }
            if svc.failures_before_alert == 0 {
                return Err(ConfigError::InvalidService {
                    service: name.clone(),
                    reason: "failures_before_alert must be at least 1".to_string(),
                });
            }
        }

        self.tz()?;

        if self.tick.is_zero() {
            warn!("tick of 0s would spin the watch loop, 1s will be used");
        }

        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, MessageError> {
        parse_time_zone(&self.time_zone)
    }

    pub fn resolve_host(&self) -> String {
        match &self.host {
            Some(host) if !host.trim().is_empty() => host.clone(),
            _ => System::host_name().unwrap_or_else(|| "unknown-host".to_string()),
        }
    }

    pub fn effective_tick(&self) -> Duration {
        if self.tick.is_zero() {
            default_tick()
        } else {
            self.tick
        }
    }
}
