use anyhow::{Result, bail};
use async_trait::async_trait;
use std::process::Output;
use std::time::Duration;
use svcwatch_shared::run_state::RestartOutcome;
use svcwatch_shared::service_spec::CommandSpec;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ActionRunner, Probe, Restarter};
use crate::util::command::{command_from_spec, safe_run_command};

const SYSTEMCTL: &str = "systemctl";

fn outcome_from_output(output: &Output) -> RestartOutcome {
    RestartOutcome {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

/// `systemctl is-active --quiet <unit>`; exit status 0 means active.
pub struct SystemctlProbe {
    program: String,
    timeout: Duration,
}

impl SystemctlProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: SYSTEMCTL.to_string(),
            timeout,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl Probe for SystemctlProbe {
    async fn is_alive(&self, service: &str) -> Result<bool> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["is-active", "--quiet", service]);
        let output = safe_run_command(cmd, self.timeout).await?;
        debug!("probe {} -> {:?}", service, output.status.code());
        Ok(output.status.success())
    }
}

/// `systemctl restart <unit>` with captured output.
pub struct SystemctlRestarter {
    program: String,
    timeout: Duration,
}

impl SystemctlRestarter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: SYSTEMCTL.to_string(),
            timeout,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl Restarter for SystemctlRestarter {
    async fn restart(&self, service: &str) -> Result<RestartOutcome> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["restart", service]);
        let output = safe_run_command(cmd, self.timeout).await?;
        let outcome = outcome_from_output(&output);
        if !outcome.success() {
            warn!(
                "restart of {} exited with {:?}: {}",
                service, outcome.exit_code, outcome.stderr
            );
        }
        Ok(outcome)
    }
}

pub struct ShellActionRunner {
    timeout: Duration,
}

impl ShellActionRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ActionRunner for ShellActionRunner {
    async fn run(&self, action: &CommandSpec) -> Result<()> {
        let cmd = command_from_spec(action)?;
        let output = safe_run_command(cmd, self.timeout).await?;
        if !output.status.success() {
            bail!(
                "'{}' exited with {:?}: {}",
                action,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
