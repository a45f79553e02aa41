//! `waymark init [--force] [--operator <name>]`

use anyhow::{Context, Result};
use clap::Args;

use waymark_core::config;
use waymark_core::source::{save_document, SourceDocument};

use super::{home_dir, resolve_actor};

/// Write `~/.waymark/config.yaml` and an empty waystone source.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config with defaults. The waystone source is
    /// never overwritten.
    #[arg(long)]
    pub force: bool,

    /// Operator granted the reload permission. Defaults to `$USER`.
    #[arg(long)]
    pub operator: Option<String>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let existed = config::config_path_at(&home).exists();

        let mut config = config::write_default_at(&home, self.force)
            .context("failed to write default config")?;
        if let Some(operator) = resolve_actor(self.operator) {
            if config.operator.granted.insert(operator.clone()) {
                config::save_at(&home, &config).context("failed to save config")?;
                println!("✓ Granted '{}' to {operator}", config.operator.permission);
            }
        }

        let config_path = config::config_path_at(&home);
        if existed && !self.force {
            println!("✓ Kept existing config: {}", config_path.display());
        } else {
            println!("✓ Wrote config: {}", config_path.display());
        }

        let source = config.source_path_at(&home);
        if source.exists() {
            println!("✓ Kept existing waystone source: {}", source.display());
        } else {
            save_document(&source, &SourceDocument::default()).with_context(|| {
                format!("failed to create waystone source at {}", source.display())
            })?;
            println!("✓ Created waystone source: {}", source.display());
        }

        if config.surface.worlds.is_empty() {
            println!("  Add worlds under `surface.worlds` in the config before starting the daemon.");
        }
        Ok(())
    }
}
