//! Debounce stdin lines into lookup command runs

use crate::system_config;
use anyhow::{Context, Result};
use coalesce_core::{CoalesceError, Edge};
use owo_colors::OwoColorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, info};
use trigger::{CommandLookup, SearchTrigger};

/// Options for `dbounce run`
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cooldown_ms: Option<u64>,
    pub leading: bool,
    pub timeout_ms: Option<u64>,
    pub stats: bool,
    pub command: Vec<String>,
}

pub async fn run(options: RunOptions) -> Result<()> {
    let mut config = system_config::load()?;

    // Flags win over the config file
    if let Some(cooldown_ms) = options.cooldown_ms {
        config.debounce.cooldown_ms = cooldown_ms;
    }
    if options.leading {
        config.debounce.edge = Edge::Leading;
    }
    if let Some(timeout_ms) = options.timeout_ms {
        config.lookup.timeout_ms = timeout_ms;
    }
    config.validate().context("Invalid options")?;

    let lookup = CommandLookup::from_argv(&options.command)
        .context("No lookup command given (usage: dbounce run -- <command> [args..])")?;
    info!(
        program = lookup.program(),
        cooldown_ms = config.debounce.cooldown_ms,
        edge = %config.debounce.edge,
        "starting trigger loop"
    );

    let trigger = SearchTrigger::new(lookup, config.debounce, config.lookup);
    let mut printers = JoinSet::new();
    let mut last_window = 0u64;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };

                let Some(channel) = trigger.on_change(&line) else {
                    continue;
                };

                // One printer per window; later calls in it share the outcome
                if channel.window_id() > last_window {
                    last_window = channel.window_id();
                    printers.spawn(async move {
                        match channel.await {
                            Ok(payload) => println!("{}", payload),
                            Err(CoalesceError::Abandoned) => {}
                            Err(e) => eprintln!("{} {}", "error:".red(), e),
                        }
                    });
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted, dropping pending lookup");
                trigger.cancel();
                break;
            }
        }
    }

    while let Some(joined) = printers.join_next().await {
        joined.context("Printer task failed")?;
    }

    if options.stats {
        let stats = serde_json::to_string(&trigger.stats())
            .context("Failed to serialize stats")?;
        eprintln!("{}", stats);
    }

    Ok(())
}
