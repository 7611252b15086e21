pub mod systemd;

use anyhow::Result;
use async_trait::async_trait;
use svcwatch_shared::run_state::RestartOutcome;
use svcwatch_shared::service_spec::CommandSpec;

pub use systemd::{ShellActionRunner, SystemctlProbe, SystemctlRestarter};

/// "Is this service active right now?" Must not change the service.
/// An `Err` is read by the engine as "not alive".
#[async_trait]
pub trait Probe: Send + Sync {
    async fn is_alive(&self, service: &str) -> Result<bool>;
}

#[async_trait]
pub trait Restarter: Send + Sync {
    async fn restart(&self, service: &str) -> Result<RestartOutcome>;
}

/// Runs one post-restart action.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(&self, action: &CommandSpec) -> Result<()>;
}
