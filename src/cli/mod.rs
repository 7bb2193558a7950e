//! Command-line interface for LiveSync
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `start`: Run a dev instance (static server or snippet mode)
//! - `init`: Write a starter config file

mod init;
mod start;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use init::InitCommand;
pub use start::StartCommand;

/// LiveSync - keep browsers in sync while you edit
#[derive(Parser, Debug)]
#[command(name = "livesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a livesync.toml (or .json) config file
    #[arg(short, long, global = true, env = "LIVESYNC_CONFIG", default_value = "livesync.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a dev instance
    Start(StartCommand),

    /// Write a starter livesync.toml
    Init(InitCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        match &self.command {
            Commands::Start(cmd) => cmd.execute(&self.config).await,
            Commands::Init(cmd) => cmd.execute().await,
        }
    }
}

/// Print the LiveSync banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "↻".cyan(),
        "LiveSync".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
