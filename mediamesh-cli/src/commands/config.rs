//! Configuration management CLI commands.
//!
//! Provides `config path` and `config init`.

use clap::Subcommand;
use mediamesh::config::{config_file_path, write_template};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Write a commented configuration template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Init { force } => run_init(force),
    }
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn run_init(force: bool) -> Result<(), CliError> {
    let path = config_file_path();
    write_template(&path, force)?;

    println!("Wrote {}", path.display());
    println!();
    println!("Set [node] owner, advertised_url and [paths] media_root before running");
    println!("'mediamesh serve'.");
    Ok(())
}
