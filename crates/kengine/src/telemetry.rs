//! Tracing setup for applications embedding the engine

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::KengineConfig;
use crate::error::{KengineError, Result};

/// Default filter for the given level; `RUST_LOG` takes precedence
pub fn default_filter(level: &str) -> String {
    format!("kengine={level},kengine_core={level},kengine::transcript={level}")
}

/// Filter for the level named in the configuration
pub fn config_filter(config: &KengineConfig) -> String {
    default_filter(&config.log_level)
}

/// Install the subscriber at the configured `log_level`
pub fn init_from_config(config: &KengineConfig) -> Result<()> {
    install(config_filter(config))
}

/// Install a global subscriber writing formatted events to stderr
pub fn init_tracing(level: &str) -> Result<()> {
    install(default_filter(level))
}

fn install(filter: String) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| KengineError::Config(format!("Failed to install tracing subscriber: {}", e)))
}
