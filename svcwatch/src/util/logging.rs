use std::sync::Once;

use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::{EnvFilter, prelude::*};

static INIT: Once = Once::new();

/// `RUST_LOG` wins over `default_level`; an unparsable level falls back to info.
pub fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_logging(log_level: &str) {
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(build_filter(log_level))
            .with(tracing_fmt::layer().with_target(false))
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging("debug");
        init_logging("trace");
        tracing::info!("logging initialised twice without panicking");
    }

    #[test]
    fn test_build_filter_tolerates_garbage_level() {
        let _ = build_filter("svcwatch=debug,warn");
        let _ = build_filter("=?=not a level");
    }
}
