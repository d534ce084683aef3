//! A small one-shot command-line client for a caskdb store directory.
//! Each invocation opens the store, runs a single operation, and closes
//! it again — it's a demonstration of the library's public API, not a
//! long-running server.

use caskdb::{Config, Store};
use clap::{Parser, Subcommand};
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "caskdb-cli", about = "Command-line client for a caskdb store")]
struct Cli {
    /// Path to the store directory.
    #[arg(short, long, default_value = "caskdb-data")]
    dir: PathBuf,

    /// Path to an optional TOML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stores a value under a key.
    Put { key: String, value: String },
    /// Retrieves the value stored under a key.
    Get { key: String },
    /// Removes a key.
    Delete { key: String },
    /// Prints the live key count and on-disk file count.
    Stats,
    /// Runs a merge pass immediately.
    Compact,
}

fn main() -> ExitCode {
    TermLogger::init(LevelFilter::Info, LogConfig::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .expect("failed to initialize logger");

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("caskdb-cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> caskdb::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let store = Store::open_with_config(&cli.dir, config)?;

    match cli.command {
        Command::Put { key, value } => store.put(&key, value.as_bytes())?,
        Command::Get { key } => {
            let value = store.get(&key)?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Command::Delete { key } => store.delete(&key)?,
        Command::Stats => {
            println!("keys: {}", store.len());
            println!("files: {}", store.file_count()?);
        }
        Command::Compact => store.compact_now()?,
    }

    store.close();
    Ok(())
}
