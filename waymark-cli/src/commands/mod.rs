pub mod daemon;
pub mod init;
pub mod refresh;
pub mod status;

use anyhow::{Context, Result};
use std::path::PathBuf;

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// `explicit`, else the invoking user from `$USER`.
pub(crate) fn resolve_actor(explicit: Option<String>) -> Option<String> {
    explicit
        .or_else(|| std::env::var("USER").ok())
        .map(|actor| actor.trim().to_string())
        .filter(|actor| !actor.is_empty())
}
