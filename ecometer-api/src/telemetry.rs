/// Tracing subscriber setup
///
/// `RUST_LOG` wins when set; otherwise the configured level applies to the
/// whole process, with `tower_http` request spans at the same level.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Builds the filter from `RUST_LOG`, falling back to the configured level
pub fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},ecometer_api={level},ecometer_shared={level},tower_http={level}",
            level = logging.level
        ))
    })
}

/// Installs the global subscriber
///
/// Fails if a subscriber is already installed.
pub fn init(logging: &LoggingConfig) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(logging));

    match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()?,
    }

    Ok(())
}
