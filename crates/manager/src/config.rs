use crate::error::{ManagerError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduling configuration for a [`ChunkManager`](crate::ChunkManager).
///
/// All durations are milliseconds. Missing fields take their defaults when
/// deserialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Quiet period after the last edit before dirty chunks are processed
    pub edit_debounce_ms: u64,

    /// Period of the background drain tick
    pub processing_interval_ms: u64,

    /// Inactivity after which an idle catch-up pass runs
    pub idle_threshold_ms: u64,

    /// Upper bound on concurrent analyzer calls within a batch
    pub max_concurrent_analyses: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            edit_debounce_ms: 800,
            processing_interval_ms: 5_000,
            idle_threshold_ms: 3_000,
            max_concurrent_analyses: 4,
        }
    }
}

impl ManagerConfig {
    /// Short timings for interactive use and tests
    #[must_use]
    pub fn responsive() -> Self {
        Self {
            edit_debounce_ms: 200,
            processing_interval_ms: 1_000,
            idle_threshold_ms: 600,
            ..Default::default()
        }
    }

    /// Parse from TOML and validate
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ManagerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("edit_debounce_ms", self.edit_debounce_ms),
            ("processing_interval_ms", self.processing_interval_ms),
            ("idle_threshold_ms", self.idle_threshold_ms),
        ] {
            if value == 0 {
                return Err(ManagerError::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        if self.max_concurrent_analyses == 0 {
            return Err(ManagerError::InvalidConfig(
                "max_concurrent_analyses must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn edit_debounce(&self) -> Duration {
        Duration::from_millis(self.edit_debounce_ms)
    }

    #[must_use]
    pub const fn processing_interval(&self) -> Duration {
        Duration::from_millis(self.processing_interval_ms)
    }

    #[must_use]
    pub const fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }
}
