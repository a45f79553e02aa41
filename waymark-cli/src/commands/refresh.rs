//! `waymark refresh [--as <actor>]`

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use waymark_daemon::{request_refresh, DaemonError, REFRESH_DONE};

use super::{home_dir, resolve_actor};

/// Operator refresh through the running daemon.
#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Operator issuing the refresh. Defaults to `$USER`.
    #[arg(long = "as", value_name = "ACTOR")]
    pub actor: Option<String>,
}

impl RefreshArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let actor = resolve_actor(self.actor).unwrap_or_default();

        match request_refresh(&home, &actor, |ack| println!("{}", ack.yellow())) {
            Ok(data) => {
                let message = data
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or(REFRESH_DONE);
                println!("{}", message.green());
                if let Some(markers) = data.pointer("/summary/markers").and_then(|m| m.as_u64()) {
                    println!("  {markers} marker(s) placed");
                }
                Ok(())
            }
            Err(DaemonError::Protocol(message)) => {
                eprintln!("{}", message.red());
                bail!("refresh failed")
            }
            Err(err) => Err(err).context("failed to reach the waymark daemon"),
        }
    }
}
