use anyhow::{Result, anyhow};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::{process::Output, time::Duration};
use svcwatch_shared::service_spec::CommandSpec;
use tokio::process::Command;
use tokio::time::timeout;

/// Runs `cmd` to completion, capturing output. The child is killed if it
/// outlives `timeout_duration`.
pub async fn safe_run_command(mut cmd: Command, timeout_duration: Duration) -> Result<Output> {
    cmd.kill_on_drop(true);
    let result = timeout(timeout_duration, cmd.output()).await;

    match result {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(anyhow!("I/O error while running command: {}", err)),
        Err(_) => Err(anyhow!(
            "Command timed out after {}s",
            timeout_duration.as_secs_f32()
        )),
    }
}

pub fn command_from_spec(spec: &CommandSpec) -> Result<Command> {
    match spec {
        CommandSpec::Sh(script) => {
            let mut cmd = Command::new("/bin/sh");
            cmd.arg("-c").arg(script);
            Ok(cmd)
        }
        CommandSpec::Argv(argv) => {
            let (program, args) = argv
                .split_first()
                .ok_or_else(|| anyhow!("empty argv command"))?;
            let mut cmd = Command::new(program);
            cmd.args(args);
            Ok(cmd)
        }
    }
}

pub fn binary_exists(name: &str) -> bool {
    if name.contains('/') {
        return fs::metadata(name).is_ok();
    }

    if let Ok(path) = env::var("PATH") {
        for dir in path.split(':') {
            let mut p = PathBuf::from(dir);
            p.push(name);
            if fs::metadata(&p).is_ok() {
                return true;
            }
        }
    }
    false
}
