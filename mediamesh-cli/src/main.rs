//! MediaMesh CLI - run and manage a catalog node.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod error;
mod runner;

use commands::config::ConfigCommands;
use commands::serve::ServeArgs;

#[derive(Debug, Parser)]
#[command(name = "mediamesh", version, about = "Share media catalogs between nodes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the node: HTTP API plus scheduled sync
    Serve {
        /// Configuration file (default: the user config directory)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Listen address, overriding [node] listen
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Run one sync cycle and print a summary
    Scan {
        /// Configuration file (default: the user config directory)
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { config, listen } => commands::serve::run(ServeArgs { config, listen }),
        Commands::Scan { config } => commands::scan::run(config),
        Commands::Config(command) => commands::config::run(command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
