use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::MonitorConfig;
use crate::config::credentials::Credentials;
use crate::monitor::Monitor;
use crate::monitor::message::{format_body, format_subject};
use crate::monitor::store::{JsonFileStore, StateStore};
use crate::notify::{Notifier, Transport};
use crate::util;
use crate::util::shutdown::{SHUTDOWN, install_signal_handlers};

#[derive(Parser)]
#[command(name = "svcwatch")]
#[command(version, about = "svcwatch - restart failing services and mail deduplicated alerts", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Config file (.json, .yaml or .yml); defaults to the user config dir
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// .env-style credentials file; defaults to `.env` next to the config
    #[arg(long)]
    env: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll every due service once, then exit
    Run(RunArgs),

    /// Keep polling until SIGINT/SIGTERM
    Watch(RunArgs),

    /// Print the persisted state of each service
    Status(ConfigArgs),

    /// Send a test message through the configured transport
    TestNotify(RunArgs),

    /// Show version information
    Version,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<PathBuf> {
        match &self.config {
            Some(p) => Ok(p.clone()),
            None => MonitorConfig::default_path(),
        }
    }
}

impl RunArgs {
    fn env_path(&self, config_path: &Path) -> Option<PathBuf> {
        self.env
            .clone()
            .or_else(|| config_path.parent().map(|dir| dir.join(".env")))
    }
}

/// Everything that can fail before a poll: config, credentials, transport.
fn prepare(args: &RunArgs) -> Result<(MonitorConfig, Transport)> {
    let config_path = args.config.resolve()?;
    let config = MonitorConfig::load(&config_path)?;
    let credentials = Credentials::load(args.env_path(&config_path).as_deref())?;
    let transport =
        Transport::from_config(config.email_provider, &credentials, config.notify_timeout)?;

    if !util::command::binary_exists("systemctl") {
        warn!("systemctl not found in PATH, every probe will report services as down");
    }

    info!(
        "Loaded {} services from {} (provider: {})",
        config.services.len(),
        config_path.display(),
        transport.provider()
    );
    Ok((config, transport))
}

pub async fn cli() -> Result<()> {
    let cli = Cli::parse();
    util::logging::init_logging(&cli.log_level);

    match cli.command {
        Commands::Run(args) => {
            let (config, transport) = prepare(&args)?;
            install_signal_handlers();

            let monitor = Monitor::from_config(&config, Arc::new(transport))
                .with_shutdown(SHUTDOWN.clone());
            let store = JsonFileStore::new(&config.state_path);
            let summary = monitor.run_once(&config, &store, Utc::now()).await?;

            info!(
                "Run complete: {} checked, {} down{}",
                summary.checked(),
                summary.down(),
                if summary.interrupted {
                    " (interrupted)"
                } else {
                    ""
                }
            );
        }

        Commands::Watch(args) => {
            let (config, transport) = prepare(&args)?;
            install_signal_handlers();

            let monitor = Arc::new(
                Monitor::from_config(&config, Arc::new(transport))
                    .with_shutdown(SHUTDOWN.clone()),
            );
            let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(&config.state_path));
            monitor.watch(&config, store).await?;
        }

        Commands::Status(args) => {
            let config_path = args.resolve()?;
            let config = MonitorConfig::load(&config_path)?;
            let tz = config.tz()?;
            let states = JsonFileStore::new(&config.state_path)
                .load()
                .with_context(|| format!("Failed to load {}", config.state_path.display()))?;

            println!(
                "{:<32} {:<8} {:>8} {:<6} LAST CHECKED",
                "SERVICE", "STATUS", "FAILURES", "ALERT"
            );
            for name in config.services.keys() {
                let state = states.get(name).cloned().unwrap_or_default();
                let last = state
                    .last_checked
                    .map(|ts| ts.with_timezone(&tz).to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:<32} {:<8} {:>8} {:<6} {}",
                    name,
                    state.status.to_string(),
                    state.consecutive_failures,
                    if state.alert_sent { "sent" } else { "-" },
                    last
                );
            }

            let orphaned: Vec<&String> = states
                .keys()
                .filter(|k| !config.services.contains_key(*k))
                .collect();
            if !orphaned.is_empty() {
                println!();
                println!("State kept for services no longer configured:");
                for name in orphaned {
                    println!("  {}", name);
                }
            }
        }

        Commands::TestNotify(args) => {
            let (config, transport) = prepare(&args)?;
            let host = config.resolve_host();
            let subject = format_subject("TEST", "svcwatch", &host);
            let body = format_body("TEST", "svcwatch", &host, &config.time_zone, Utc::now())?;

            println!("Sending test message via {}...", transport.provider());
            if let Err(e) = transport.send(&subject, &body).await {
                bail!("Test message failed: {e}");
            }
            println!("Test message sent");
        }

        Commands::Version => {
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Build: {}", env!("GIT_COMMIT"));
            println!("Rust: {}", env!("RUSTC_VERSION"));
            println!(
                "Platform: {}/{}",
                std::env::consts::OS,
                std::env::consts::ARCH
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_paths() {
        let cli = Cli::parse_from([
            "svcwatch",
            "--log-level",
            "debug",
            "run",
            "--config",
            "/etc/svcwatch/config.yaml",
            "--env",
            "/etc/svcwatch/secrets.env",
        ]);
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(
                    args.config.config,
                    Some(PathBuf::from("/etc/svcwatch/config.yaml"))
                );
                assert_eq!(args.env, Some(PathBuf::from("/etc/svcwatch/secrets.env")));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_env_defaults_next_to_config() {
        let args = RunArgs {
            config: ConfigArgs { config: None },
            env: None,
        };
        assert_eq!(
            args.env_path(Path::new("/etc/svcwatch/config.json")),
            Some(PathBuf::from("/etc/svcwatch/.env"))
        );
    }

    #[test]
    fn test_prepare_fails_on_missing_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{"email_provider": "smtp", "services": {"nginx.service": {}}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("empty.env"), "# nothing here\n").unwrap();

        // SMTP_* could leak in from the environment; only assert when they don't
        if std::env::var("SMTP_HOST").is_ok() || std::env::var("SMTP_TO").is_ok() {
            return;
        }

        let args = RunArgs {
            config: ConfigArgs {
                config: Some(config_path),
            },
            env: Some(dir.path().join("empty.env")),
        };
        let err = prepare(&args).err().unwrap();
        assert!(err.to_string().contains("SMTP_HOST"));
    }

    #[test]
    fn test_prepare_fails_on_empty_services() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"services": {}}"#).unwrap();

        let args = RunArgs {
            config: ConfigArgs {
                config: Some(config_path),
            },
            env: None,
        };
        let err = prepare(&args).err().unwrap();
        assert!(err.to_string().contains("no services configured"));
    }
}
