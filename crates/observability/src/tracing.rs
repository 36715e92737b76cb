//! Tracing subscriber initialization.
//!
//! `RUST_LOG` picks the filter (default `info`), `SUPPLYTRACE_LOG_FORMAT`
//! picks the output (`json` by default, `compact` for local runs).

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_VAR: &str = "SUPPLYTRACE_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "compact" | "text" => Ok(Self::Compact),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

pub fn init() {
    let format = std::env::var(LOG_FORMAT_VAR)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default();
    init_with(format);
}

/// Install a global subscriber with the given format.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_with(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match format {
        LogFormat::Json => builder
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .try_init()
            .is_ok(),
        LogFormat::Compact => builder.compact().try_init().is_ok(),
    };
    if installed {
        ::tracing::debug!(?format, "tracing initialized");
    }
    installed
}
