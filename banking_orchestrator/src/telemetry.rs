use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;
use crate::error::AnalysisError;
use crate::Result;

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init(config: &TelemetryConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            AnalysisError::Configuration(format!(
                "invalid log level/filter '{}': {}",
                config.log_level, e
            ))
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| AnalysisError::Configuration(format!("telemetry error: {}", e)))
}
