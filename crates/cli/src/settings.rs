use anyhow::{Context, Result};
use chunkcache_manager::ManagerConfig;
use std::fs;
use std::path::Path;

/// Command-line overrides applied on top of the config file
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub debounce_ms: Option<u64>,
    pub concurrency: Option<usize>,
}

/// Load the manager config from an optional TOML file, then apply overrides.
pub fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<ManagerConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            ManagerConfig::from_toml_str(&raw)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => ManagerConfig::default(),
    };

    if let Some(ms) = overrides.debounce_ms {
        config.edit_debounce_ms = ms;
    }
    if let Some(limit) = overrides.concurrency {
        config.max_concurrent_analyses = limit;
    }
    config.validate().context("Invalid command-line overrides")?;
    Ok(config)
}
