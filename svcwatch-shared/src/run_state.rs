use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Persisted form: service name -> state. Ordered so an unchanged map
/// serializes to identical bytes.
pub type StateMap = BTreeMap<String, ServiceState>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    #[default]
    Unknown,
    Up,
    Down,
}

impl Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Unknown => write!(f, "unknown"),
            ServiceStatus::Up => write!(f, "up"),
            ServiceStatus::Down => write!(f, "down"),
        }
    }
}

/// Diagnostics from the last restart attempt. `exit_code` is `None` when the
/// restart could not be spawned or was killed by timeout/signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartOutcome {
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl RestartOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default)]
    pub consecutive_failures: u32,
    /// Set once the ALERT for the current down streak went out.
    #[serde(default)]
    pub alert_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_restart: Option<RestartOutcome>,
}

impl ServiceState {
    pub fn mark_up(&mut self) {
        self.status = ServiceStatus::Up;
        self.consecutive_failures = 0;
        self.alert_sent = false;
    }

    /// Records one more failed probe and returns the new streak length.
    pub fn mark_down(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.status = ServiceStatus::Down;
        self.consecutive_failures
    }

    pub fn is_down(&self) -> bool {
        self.status == ServiceStatus::Down
    }
}
