//! Tracing subscriber setup.

use anyhow::{anyhow, Context};
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Pretty,
    /// Newline-delimited JSON
    Json,
}

/// Build the filter used by [`init_tracing`].
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level directive '{}'", level)),
    }
}

/// Install the global tracing subscriber.
///
/// Fails (instead of panicking) when a global subscriber is already set.
pub fn init_tracing(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = env_filter(level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_accepts_directives() {
        assert!(env_filter("info").is_ok());
        assert!(env_filter("certflow_acme=debug,warn").is_ok());
    }
}
