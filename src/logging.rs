//! Tracing subscriber setup.
//!
//! `RUST_LOG` directives take precedence. The crate's own level defaults to
//! `info` and can be changed with `CONDUCTOR_LOG` without touching other
//! crates.

use std::io::IsTerminal;
use std::sync::Once;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

/// Environment variable selecting the crate log level.
pub const CONDUCTOR_LOG_ENV_VAR: &str = "CONDUCTOR_LOG";

const CRATE_NAME: &str = env!("CARGO_CRATE_NAME");

/// Initializes the global subscriber. Later calls are no-ops, so tests may
/// call this freely.
pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let (env_filter, log_level) = env_filter_and_log_level(
            &std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default(),
            std::env::var(CONDUCTOR_LOG_ENV_VAR).ok(),
        );

        let installed = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .try_init()
            .is_ok();
        if installed {
            tracing::info!("log level: {log_level}");
        }
    });
}

fn env_filter_and_log_level(directives: &str, crate_level: Option<String>) -> (EnvFilter, String) {
    let mut env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives);
    let log_level = crate_level.unwrap_or_else(|| "info".to_owned());

    if !directives.contains(&format!("{CRATE_NAME}="))
        && let Ok(directive) = format!("{CRATE_NAME}={log_level}").parse()
    {
        env_filter = env_filter.add_directive(directive);
    }
    (env_filter, log_level)
}
