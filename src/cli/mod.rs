use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, PathOverrides};
use crate::storage;

pub mod commands;

use self::commands::{NewArgs, ShowArgs};

#[derive(Parser, Debug)]
#[command(
    name = "termnote",
    version,
    about = "Write and browse plain-text notes from the terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Use this config file instead of the platform default
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Keep notes in this directory (wins over the config file)
    #[arg(long)]
    pub vault: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Print every note in the vault with its modification time
    List,
    /// Create a new note from the command line
    New(NewArgs),
    /// Print the content of a note
    Show(ShowArgs),
}

/// Where log lines go. The TUI owns the terminal, so it logs to a file.
#[derive(Debug, Clone)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let overrides = PathOverrides {
        config: cli.config.clone(),
        vault: cli.vault.clone(),
    };

    let loader = ConfigLoader::discover(&overrides)?;
    loader.paths().ensure_directories()?;
    let command = cli.command.unwrap_or(Commands::Tui);
    let target = match command {
        Commands::Tui => LogTarget::File(loader.paths().log_file()),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, &target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let config = loader.load_or_init()?;
    let vault = storage::init(&config.vault)?;
    let config = Arc::new(config);

    match command {
        Commands::Tui => commands::run_tui(config, vault),
        Commands::List => commands::list_notes(&vault),
        Commands::New(args) => commands::new_note(&vault, args),
        Commands::Show(args) => commands::show_note(&vault, args),
    }
}

fn init_tracing(level: &str, target: &LogTarget) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match target {
            LogTarget::Stderr => fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init(),
            LogTarget::File(path) => fmt()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?))
                .init(),
        }
        Ok(())
    })
    .map(|_| ())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}
