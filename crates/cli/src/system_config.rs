//! System-wide configuration file
//!
//! Lives at `<config dir>/dbounce/config.toml` unless `DBOUNCE_CONFIG`
//! points elsewhere. A missing file means defaults.

use anyhow::{Context, Result};
use coalesce_core::DebounceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trigger::LookupConfig;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "DBOUNCE_CONFIG";

/// Largest accepted lookup timeout (10 minutes)
pub const MAX_TIMEOUT_MS: u64 = 600_000;

/// Contents of config.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub debounce: DebounceConfig,

    #[serde(default)]
    pub lookup: LookupConfig,
}

impl SystemConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        self.debounce.validate()?;

        if self.lookup.timeout_ms == 0 || self.lookup.timeout_ms > MAX_TIMEOUT_MS {
            anyhow::bail!(
                "lookup.timeout_ms must be between 1 and {} (got {})",
                MAX_TIMEOUT_MS,
                self.lookup.timeout_ms
            );
        }

        Ok(())
    }
}

/// Resolve the config file path
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("dbounce").join("config.toml"))
}

/// Load configuration, falling back to defaults when no file exists
pub fn load() -> Result<SystemConfig> {
    match config_file_path() {
        Some(path) => load_from(&path),
        None => Ok(SystemConfig::default()),
    }
}

pub fn load_from(path: &Path) -> Result<SystemConfig> {
    if !path.exists() {
        return Ok(SystemConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: SystemConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config.validate()
        .with_context(|| format!("Invalid config file {}", path.display()))?;

    Ok(config)
}

/// Save configuration to the default location
pub fn save(config: &SystemConfig) -> Result<()> {
    let path = config_file_path()
        .context("Could not determine config file path")?;
    save_to(config, &path)
}

pub fn save_to(config: &SystemConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;
    }

    let serialized = toml::to_string_pretty(config)
        .context("Failed to serialize config")?;
    std::fs::write(path, serialized)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}

/// Write a default config file if none exists yet
pub fn init_if_missing() -> Result<PathBuf> {
    let path = config_file_path()
        .context("Could not determine config file path")?;
    if !path.exists() {
        save_to(&SystemConfig::default(), &path)?;
    }
    Ok(path)
}

/// Annotated example config
pub fn example_config() -> &'static str {
    r#"# dbounce configuration

[debounce]
# Quiet period before a trailing-edge fire, in milliseconds (0-60000)
cooldown_ms = 300
# "trailing" runs after input stops; "leading" runs on the first input
edge = "trailing"

[lookup]
# Time allowed for one lookup command, in milliseconds (1-600000)
timeout_ms = 10000
"#
}
