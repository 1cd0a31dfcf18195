//! dbounce CLI - debounce bursts of input into single command runs

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod system_config;

/// dbounce - collapse bursts of input lines into one lookup per quiet period
#[derive(Parser)]
#[command(name = "dbounce")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read terms from stdin and run a lookup command once input settles
    Run {
        /// Cooldown in milliseconds (default: from config, 300)
        #[arg(long)]
        cooldown_ms: Option<u64>,
        /// Run on the first line of a burst instead of the last
        #[arg(long)]
        leading: bool,
        /// Per-lookup timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Print coalescing counters as JSON on stderr at exit
        #[arg(long)]
        stats: bool,
        /// Lookup command; the term is appended as its last argument
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// View or edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all values
    List,
    /// Print one value
    Get {
        /// Key, e.g. debounce.cooldown_ms
        key: String,
    },
    /// Set one value
    Set {
        key: String,
        value: String,
    },
    /// Show the config file path
    Path {
        /// Create the file with defaults if missing
        #[arg(long)]
        create: bool,
    },
    /// Print an annotated example config
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for payloads
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { cooldown_ms, leading, timeout_ms, stats, command } => {
            cmd::run::run(cmd::run::RunOptions {
                cooldown_ms,
                leading,
                timeout_ms,
                stats,
                command,
            })
            .await
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list().await,
            ConfigCommands::Get { key } => cmd::config::run_get(&key).await,
            ConfigCommands::Set { key, value } => cmd::config::run_set(&key, &value).await,
            ConfigCommands::Path { create } => cmd::config::run_path(create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}
