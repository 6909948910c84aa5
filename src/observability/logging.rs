//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Choose pretty or JSON output
//! - Configure log level from config, overridable by `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter used when `RUST_LOG` is unset.
fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("relay_proxy={level},tower_http={level}"))
        .unwrap_or_else(|_| EnvFilter::new("relay_proxy=info,tower_http=info"))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_falls_back_on_bad_level() {
        let filter = default_filter("info");
        assert!(filter.to_string().contains("relay_proxy=info"));

        let filter = default_filter("not a level!");
        assert!(filter.to_string().contains("relay_proxy=info"));
    }
}
