//! Recording stand-ins for the monitor's collaborators.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use svcwatch_shared::run_state::RestartOutcome;
use svcwatch_shared::service_spec::CommandSpec;

use super::Monitor;
use crate::notify::{Notifier, NotifyError};
use crate::services::{ActionRunner, Probe, Restarter};

/// Probe answers are consumed in order (`None` = probe error); once
/// exhausted the service reads as alive.
#[derive(Default)]
pub struct Fakes {
    probes: Mutex<VecDeque<Option<bool>>>,
    events: Mutex<Vec<String>>,
    failing_sends: AtomicU32,
    failing_actions: AtomicBool,
    failing_restarts: AtomicBool,
}

impl Fakes {
    pub fn with_probes(answers: impl IntoIterator<Item = Option<bool>>) -> Arc<Self> {
        Arc::new(Self {
            probes: Mutex::new(answers.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn monitor(self: &Arc<Self>) -> Monitor {
        Monitor::new(
            "web-1",
            "UTC",
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        )
    }

    pub fn fail_next_sends(&self, n: u32) {
        self.failing_sends.store(n, Ordering::SeqCst);
    }

    pub fn fail_actions(&self) {
        self.failing_actions.store(true, Ordering::SeqCst);
    }

    pub fn fail_restarts(&self) {
        self.failing_restarts.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Probe for Fakes {
    async fn is_alive(&self, service: &str) -> Result<bool> {
        self.record(format!("probe {service}"));
        match self.probes.lock().unwrap().pop_front() {
            Some(Some(alive)) => Ok(alive),
            Some(None) => Err(anyhow!("probe exploded")),
            None => Ok(true),
        }
    }
}

#[async_trait]
impl Restarter for Fakes {
    async fn restart(&self, service: &str) -> Result<RestartOutcome> {
        self.record(format!("restart {service}"));
        if self.failing_restarts.load(Ordering::SeqCst) {
            bail!("systemctl unavailable");
        }
        Ok(RestartOutcome {
            exit_code: Some(0),
            ..Default::default()
        })
    }
}

#[async_trait]
impl ActionRunner for Fakes {
    async fn run(&self, action: &CommandSpec) -> Result<()> {
        self.record(format!("action {action}"));
        if self.failing_actions.load(Ordering::SeqCst) {
            bail!("action failed");
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for Fakes {
    async fn send(&self, subject: &str, _body: &str) -> Result<(), NotifyError> {
        self.record(format!("notify {subject}"));
        let remaining = self.failing_sends.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_sends.store(remaining - 1, Ordering::SeqCst);
            return Err(NotifyError::Smtp("connection refused".to_string()));
        }
        Ok(())
    }
}
