//! Tandem CLI
//!
//! Command-line interface for Tandem - offline-first todos.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tandem_core::{Config, Session};

mod commands;
mod output;
mod tui;

use commands::todo::ListSource;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Tandem - Offline-first todos reconciled with a GraphQL API")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Start offline (no remote calls)
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the TUI interface
    Tui,
    /// Add a todo
    Add {
        /// Todo name
        name: String,
    },
    /// Toggle a todo's done flag
    Toggle {
        /// Todo ID
        id: String,
    },
    /// Delete a todo
    #[command(alias = "rm")]
    Delete {
        /// Todo ID
        id: String,
    },
    /// List todos (local by default)
    #[command(alias = "ls")]
    List {
        /// List the remote todos instead
        #[arg(long, conflicts_with = "local")]
        remote: bool,
        /// List the local todos (default)
        #[arg(long)]
        local: bool,
    },
    /// Push local changes and pull remote ones
    Sync,
    /// Show status (connectivity, pending changes)
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (endpoint, api_key, poll_interval_ms, ...)
        key: String,
        /// Configuration value ("none" clears optional values)
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Commands that don't need the store
    if let Some(Commands::Config { command }) = &cli.command {
        return handle_config_command(command.clone(), &output);
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    if cli.offline {
        config.start_online = false;
    }

    // Handle TUI (default when no command given)
    let Some(command) = cli.command else {
        return tui::run(config).await;
    };
    if matches!(command, Commands::Tui) {
        return tui::run(config).await;
    }

    init_cli_logging();
    let session = Session::open(config).await?;
    let engine = session.engine();

    match command {
        Commands::Tui | Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Add { name } => commands::todo::add(engine, name, &output).await,
        Commands::Toggle { id } => commands::todo::toggle(engine, id, &output).await,
        Commands::Delete { id } => commands::todo::delete(engine, id, &output).await,
        Commands::List { remote, .. } => {
            if remote {
                commands::todo::list(engine, ListSource::Remote, &output).await
            } else {
                // Pull before reading so the local list is current
                commands::sync::sync_quiet(engine).await;
                commands::todo::list(engine, ListSource::Local, &output).await
            }
        }
        Commands::Sync => commands::sync::sync(engine, &output).await,
        Commands::Status => commands::status::show(&session, &output).await,
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

/// Initialize logging for one-shot commands
///
/// Only initializes if TANDEM_LOG is set. Logs go to stderr so stdout
/// stays clean for --json and --quiet.
fn init_cli_logging() {
    let Ok(log_level) = std::env::var("TANDEM_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(format!(
        "tandem_core={},tandem_cli={}",
        log_level, log_level
    ));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
