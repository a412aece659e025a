//! Log subscriber setup.

use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// `key=value` fields after the message.
    Logfmt,
    /// Alias of `logfmt`.
    Text,
}

/// Parses a level name, falling back to `info`.
///
/// Returns the level and whether the input was rejected.
pub fn parse_level(level: &str) -> (LevelFilter, bool) {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => (LevelFilter::WARN, false),
        other => other
            .parse::<LevelFilter>()
            .map_or((LevelFilter::INFO, true), |parsed| (parsed, false)),
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG`, when set, overrides `level`.
pub fn init(format: LogFormat, level: &str) -> Result<()> {
    let (default_level, rejected) = parse_level(level);
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Logfmt | LogFormat::Text => registry.with(fmt::layer()).try_init(),
    }
    .context("failed to install log subscriber")?;

    if rejected {
        tracing::warn!(level, "unrecognized log level, falling back to info");
    }

    Ok(())
}
