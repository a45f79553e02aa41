//! `waymark daemon`: foreground runtime and socket control.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use waymark_daemon::paths::socket_path;
use waymark_daemon::{
    request_reload_surface, request_status, request_stop, start_blocking, DaemonError,
};

use super::{home_dir, resolve_actor};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (timer, reset recovery, socket server).
    Start,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status over the Unix socket.
    Status,
    /// Drop every layer on the surface, as an external map reload would.
    ReloadSurface(ReloadArgs),
}

#[derive(Args, Debug)]
pub struct ReloadArgs {
    /// Operator issuing the reload. Defaults to `$USER`.
    #[arg(long = "as", value_name = "ACTOR")]
    pub actor: Option<String>,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = home_dir()?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => {
            let status = match request_status(&home) {
                Ok(status) => status,
                Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                }),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&status)
                    .context("failed to render daemon status JSON")?
            );
        }
        DaemonCommand::ReloadSurface(args) => {
            let actor = resolve_actor(args.actor).unwrap_or_default();
            match request_reload_surface(&home, &actor) {
                Ok(data) => {
                    if let Some(message) = data.get("message").and_then(|m| m.as_str()) {
                        println!("{message}");
                    }
                }
                Err(DaemonError::Protocol(message)) => {
                    eprintln!("{message}");
                    bail!("surface reload failed");
                }
                Err(err) => return Err(err).context("failed to reach the waymark daemon"),
            }
        }
    }

    Ok(())
}
