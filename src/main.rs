//! Strategy builder - main entry point
//!
//! Subcommands:
//! - list / show / delete / save: work against the configured strategy store
//! - new / validate / schema: local draft tooling, no store needed

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::strategies::StoreAction;

#[derive(Parser, Debug)]
#[command(name = "strategy-builder")]
#[command(about = "Compose, validate and manage no-code trading strategies", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (environment settings are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List saved strategies
    List,

    /// Load a saved strategy and print its rules and JSON
    Show {
        /// Strategy id
        id: i64,
    },

    /// Delete a saved strategy
    Delete {
        /// Strategy id
        id: i64,
    },

    /// Save a draft configuration file as a new strategy
    Save {
        /// Draft configuration (JSON)
        file: PathBuf,

        /// Strategy name
        #[arg(short, long)]
        name: String,
    },

    /// Write the default draft configuration
    New {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a draft configuration file before a backtest
    Validate {
        /// Draft configuration (JSON)
        file: PathBuf,
    },

    /// Print indicators, parameters, operators and exit presets
    Schema,
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    // Console logs go to stderr so JSON printed on stdout stays clean
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Log file: {}", log_path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::List => "list",
        Commands::Show { .. } => "show",
        Commands::Delete { .. } => "delete",
        Commands::Save { .. } => "save",
        Commands::New { .. } => "new",
        Commands::Validate { .. } => "validate",
        Commands::Schema => "schema",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::List => commands::strategies::run(cli.config, StoreAction::List),
        Commands::Show { id } => commands::strategies::run(cli.config, StoreAction::Show(id)),
        Commands::Delete { id } => commands::strategies::run(cli.config, StoreAction::Delete(id)),
        Commands::Save { file, name } => {
            commands::strategies::run(cli.config, StoreAction::Save { file, name })
        }
        Commands::New { output } => commands::draft::new_draft(output),
        Commands::Validate { file } => commands::draft::validate(file),
        Commands::Schema => commands::draft::schema(),
    }
}
