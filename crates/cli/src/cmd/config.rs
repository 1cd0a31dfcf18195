//! Configuration management command
//!
//! Provides CLI interface to view and edit the config file.

use crate::system_config;
use anyhow::{Context, Result};
use coalesce_core::Edge;
use owo_colors::OwoColorize;

/// List all configuration values
pub async fn run_list() -> Result<()> {
    let config = system_config::load()?;
    let config_path = system_config::config_file_path()
        .context("Could not determine config file path")?;

    println!("{}", "Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    println!("{}", "[debounce]".yellow());
    println!(
        "  {} = {} {}",
        "cooldown_ms".cyan(),
        config.debounce.cooldown_ms,
        format!("({:?})", config.debounce.cooldown()).dimmed()
    );
    println!("  {} = {}", "edge".cyan(), config.debounce.edge);

    println!("\n{}", "[lookup]".yellow());
    println!("  {} = {}", "timeout_ms".cyan(), config.lookup.timeout_ms);

    println!("\n{}", "Valid Ranges:".bold());
    println!("  cooldown_ms: 0-60,000");
    println!("  edge: trailing | leading");
    println!("  timeout_ms: 1-600,000");

    Ok(())
}

/// Get a single configuration value
pub async fn run_get(key: &str) -> Result<()> {
    let config = system_config::load()?;

    let value = match key {
        "debounce.cooldown_ms" => config.debounce.cooldown_ms.to_string(),
        "debounce.edge" => config.debounce.edge.to_string(),
        "lookup.timeout_ms" => config.lookup.timeout_ms.to_string(),
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'dbounce config list' to see available keys.",
            key
        ),
    };

    println!("{}", value);
    Ok(())
}

/// Set a configuration value
pub async fn run_set(key: &str, value: &str) -> Result<()> {
    let mut config = system_config::load()?;

    match key {
        "debounce.cooldown_ms" => {
            let val: u64 = value.parse()
                .context("Invalid value: must be a non-negative integer")?;
            config.debounce.cooldown_ms = val;
        }
        "debounce.edge" => {
            let val: Edge = value.parse()
                .map_err(anyhow::Error::msg)?;
            config.debounce.edge = val;
        }
        "lookup.timeout_ms" => {
            let val: u64 = value.parse()
                .context("Invalid value: must be a positive integer")?;
            config.lookup.timeout_ms = val;
        }
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'dbounce config list' to see available keys.",
            key
        ),
    }

    // Validate before saving
    config.validate()
        .context("Invalid configuration value")?;

    system_config::save(&config)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(create: bool) -> Result<()> {
    let config_path = system_config::config_file_path()
        .context("Could not determine config file path")?;

    if create && !config_path.exists() {
        system_config::init_if_missing()?;
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else {
        println!("{}", config_path.display());
        if !config_path.exists() {
            println!("{}", "File does not exist. Use --create to create it.".yellow());
        }
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    print!("{}", system_config::example_config());
    Ok(())
}
