//! waymark: keep waystone markers on the web map in step with the waystone
//! source.
//!
//! # Usage
//!
//! ```text
//! waymark init [--force] [--operator <name>]
//! waymark status [--json]
//! waymark refresh [--as <actor>]
//! waymark daemon start|stop|status|reload-surface
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonCommand, init::InitArgs, refresh::RefreshArgs, status::StatusArgs};

#[derive(Parser, Debug)]
#[command(
    name = "waymark",
    version,
    about = "Synchronize waystone markers onto the web map",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the default config and an empty waystone source.
    Init(InitArgs),

    /// Show the markers each world would carry, computed offline.
    Status(StatusArgs),

    /// Ask the running daemon to refresh every world's markers.
    Refresh(RefreshArgs),

    /// Run and control the background daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Refresh(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
