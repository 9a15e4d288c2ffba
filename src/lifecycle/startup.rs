//! Startup orchestration.

use crate::config::{apply_config, BalancerConfig};
use crate::engine::{Engine, EngineResult, EngineSettings};

/// Build an engine from a validated configuration and populate its pools.
///
/// Must be called inside a Tokio runtime when heartbeats are enabled.
pub fn build_engine(config: &BalancerConfig) -> EngineResult<Engine> {
    let settings = EngineSettings::from(config);
    tracing::info!(
        heartbeat_enabled = settings.heartbeat_enabled,
        interval_secs = config.health.interval_secs,
        failure_threshold = config.health.failure_threshold,
        "Building engine"
    );

    let engine = Engine::new(settings);
    apply_config(&engine, config)?;
    Ok(engine)
}
