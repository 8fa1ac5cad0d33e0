//! TOML loading for the daemon binary.
//!
//! Loads `conatus.toml`, falls back to defaults when the file is missing
//! or unparseable. Validation happens at daemon construction, not here.

use conatus_core::Config;
use std::path::Path;

/// Load config from a TOML file, falling back to defaults.
pub fn load(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {} — using defaults", path.display(), e);
                Config::default()
            }
        },
        Err(_) => {
            tracing::info!("No config at {} — using defaults", path.display());
            Config::default()
        }
    }
}

/// Render a config as TOML (for generating a default config file).
pub fn to_toml(config: &Config) -> String {
    toml::to_string_pretty(config).unwrap_or_default()
}
