//! Engine configuration, loaded from the environment.
//!
//! Mirrors the `config`-crate idiom used elsewhere in the workspace:
//! environment variables with a `__` separator deserialize directly into
//! a strongly-typed struct, with per-field defaults for anything omitted.

use serde::Deserialize;

/// Tunables for the engine's admission and timeout behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Worker pool capacity (§4.4). Bounds concurrently admitted runs.
    #[serde(default = "default_worker_pool_capacity")]
    pub worker_pool_capacity: usize,

    /// Default per-node timeout in milliseconds, used when a node's
    /// `timeout_ms` config key is absent or non-positive (§4.5 step 3).
    #[serde(default = "default_node_timeout_ms")]
    pub default_node_timeout_ms: u64,

    /// Per-trigger-fire deadline in seconds (§5, §4.8 step 6).
    #[serde(default = "default_trigger_fire_timeout_secs")]
    pub trigger_fire_timeout_secs: u64,

    /// Startup ready-wait for external-process triggers, in seconds
    /// (§4.7 step 1, §6).
    #[serde(default = "default_external_trigger_ready_timeout_secs")]
    pub external_trigger_ready_timeout_secs: u64,
}

fn default_worker_pool_capacity() -> usize {
    100
}

fn default_node_timeout_ms() -> u64 {
    30_000
}

fn default_trigger_fire_timeout_secs() -> u64 {
    300
}

fn default_external_trigger_ready_timeout_secs() -> u64 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_capacity: default_worker_pool_capacity(),
            default_node_timeout_ms: default_node_timeout_ms(),
            trigger_fire_timeout_secs: default_trigger_fire_timeout_secs(),
            external_trigger_ready_timeout_secs: default_external_trigger_ready_timeout_secs(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from environment variables (e.g.
    /// `ENGINE__WORKER_POOL_CAPACITY=50`).
    ///
    /// # Errors
    ///
    /// Returns an error if a present variable fails to parse into its
    /// field's type.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("ENGINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = EngineConfig::default();
        assert_eq!(config.worker_pool_capacity, 100);
        assert_eq!(config.default_node_timeout_ms, 30_000);
        assert_eq!(config.trigger_fire_timeout_secs, 300);
        assert_eq!(config.external_trigger_ready_timeout_secs, 10);
    }
}
