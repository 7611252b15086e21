pub mod daemon;
pub mod gate;
pub mod message;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use svcwatch_shared::run_state::{RestartOutcome, ServiceState, ServiceStatus};
use svcwatch_shared::service_spec::ServiceConfig;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::notify::Notifier;
use crate::services::{
    ActionRunner, Probe, Restarter, ShellActionRunner, SystemctlProbe, SystemctlRestarter,
};
use gate::should_check;
use message::{Notice, NoticeKind};
use store::StateStore;

/// Drives the per-service state machine. Every side effect goes through one
/// of the injected collaborators.
pub struct Monitor {
    host: String,
    time_zone: String,
    probe: Arc<dyn Probe>,
    restarter: Arc<dyn Restarter>,
    actions: Arc<dyn ActionRunner>,
    notifier: Arc<dyn Notifier>,
    shutdown: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub name: String,
    /// False when the interval gate skipped the service.
    pub checked: bool,
    pub status: ServiceStatus,
    pub consecutive_failures: u32,
    pub alert_sent: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub services: Vec<ServiceReport>,
    /// Set when a stop request cut the pass short.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn checked(&self) -> usize {
        self.services.iter().filter(|s| s.checked).count()
    }

    pub fn down(&self) -> usize {
        self.services
            .iter()
            .filter(|s| s.status == ServiceStatus::Down)
            .count()
    }
}

impl Monitor {
    pub fn new(
        host: impl Into<String>,
        time_zone: impl Into<String>,
        probe: Arc<dyn Probe>,
        restarter: Arc<dyn Restarter>,
        actions: Arc<dyn ActionRunner>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            host: host.into(),
            time_zone: time_zone.into(),
            probe,
            restarter,
            actions,
            notifier,
            shutdown: CancellationToken::new(),
        }
    }

    /// systemd-backed monitor with the timeouts from `config`.
    pub fn from_config(config: &MonitorConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(
            config.resolve_host(),
            config.time_zone.clone(),
            Arc::new(SystemctlProbe::new(config.probe_timeout)),
            Arc::new(SystemctlRestarter::new(config.restart_timeout)),
            Arc::new(ShellActionRunner::new(config.action_timeout)),
            notifier,
        )
    }

    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// One poll of one service. Returns `state` untouched when the interval
    /// gate says the service is not due; otherwise probes it and applies the
    /// up/down transition with its restart and notification side effects.
    pub async fn apply_poll(
        &self,
        name: &str,
        config: &ServiceConfig,
        mut state: ServiceState,
        now: DateTime<Utc>,
    ) -> ServiceState {
        if !should_check(&state, config.check_interval_seconds, now) {
            return state;
        }

        let alive = match self.probe.is_alive(name).await {
            Ok(alive) => alive,
            Err(e) => {
                tracing::warn!("probe for {} failed, counting as down: {e}", name);
                false
            }
        };
        state.last_checked = Some(now);

        if alive {
            if state.is_down() {
                tracing::info!(
                    "{} is back up after {} failed checks",
                    name,
                    state.consecutive_failures
                );
                // delivery failure must not hold the service in `down`
                self.notify(NoticeKind::Recovered, name, now).await;
            }
            state.mark_up();
            return state;
        }

        let streak = state.mark_down();
        tracing::warn!("{} is down ({} consecutive failures)", name, streak);

        if streak == config.failures_before_restart {
            state.last_restart = Some(self.restart(name).await);
            for action in &config.post_restart_commands {
                if let Err(e) = self.actions.run(action).await {
                    tracing::warn!("post-restart action for {} failed: {e}", name);
                }
            }
        }

        if streak >= config.failures_before_alert && !state.alert_sent {
            state.alert_sent = self.notify(NoticeKind::Alert, name, now).await;
        }

        state
    }

    /// Loads state, polls every configured service in name order and saves
    /// once at the end. State of services missing from the config is kept.
    pub async fn run_once(
        &self,
        config: &MonitorConfig,
        store: &dyn StateStore,
        now: DateTime<Utc>,
    ) -> Result<RunSummary> {
        let mut states = store.load()?;
        let mut summary = RunSummary::default();

        for (name, svc) in &config.services {
            if self.shutdown.is_cancelled() {
                tracing::info!("Stop requested, skipping remaining services");
                summary.interrupted = true;
                break;
            }

            let prior = states.get(name).cloned();
            let known = prior.is_some();
            let prior = prior.unwrap_or_default();
            let checked = should_check(&prior, svc.check_interval_seconds, now);
            let next = self.apply_poll(name, svc, prior, now).await;

            summary.services.push(ServiceReport {
                name: name.clone(),
                checked,
                status: next.status,
                consecutive_failures: next.consecutive_failures,
                alert_sent: next.alert_sent,
            });

            if checked || known {
                states.insert(name.clone(), next);
            }
        }

        store.save(&states)?;
        Ok(summary)
    }

    async fn restart(&self, name: &str) -> RestartOutcome {
        tracing::info!("Restarting {}", name);
        match self.restarter.restart(name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("restart of {} could not run: {e}", name);
                RestartOutcome {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                }
            }
        }
    }

    /// True only when the transport confirmed delivery.
    async fn notify(&self, kind: NoticeKind, name: &str, now: DateTime<Utc>) -> bool {
        let notice = match Notice::build(kind, name, &self.host, &self.time_zone, now) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("cannot format {} for {}: {e}", kind, name);
                return false;
            }
        };

        match self.notifier.send(&notice.subject, &notice.body).await {
            Ok(()) => {
                tracing::info!("{} sent for {}", kind, name);
                true
            }
            Err(e) => {
                tracing::error!("failed to send {} for {}: {e}", kind, name);
                false
            }
        }
    }
}
