//! `waymark status`: the markers each configured world would carry, computed
//! from the current source without contacting the daemon.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use waymark_core::source::{FileSource, SourceSnapshot, WaypointSource};
use waymark_core::types::{Partition, PartitionId, WaypointRecord};
use waymark_core::{config, Config};
use waymark_renderer::{MarkerBuilder, TooltipEngine};
use waymark_sync::{desired_markers, fingerprint, SyncSettings};

/// Arguments for `waymark status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let config = config::load_at(&home).context("failed to load config")?;
        let report = build_report(&home, &config)?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
        } else {
            print_table(&report);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    source: String,
    fingerprint: String,
    waystones: usize,
    /// Waystones whose world is not configured on the surface.
    unplaced: usize,
    show_locked: bool,
    worlds: Vec<WorldStatus>,
}

#[derive(Debug, Serialize)]
struct WorldStatus {
    id: PartitionId,
    name: String,
    markers: usize,
    hidden_locked: usize,
    degraded: usize,
}

#[derive(Tabled)]
struct WorldRow {
    #[tabled(rename = "world")]
    name: String,
    #[tabled(rename = "markers")]
    markers: usize,
    #[tabled(rename = "hidden locked")]
    hidden_locked: usize,
    #[tabled(rename = "placeholders")]
    degraded: usize,
}

fn build_report(home: &Path, config: &Config) -> Result<StatusReport> {
    let source_path = config.source_path_at(home);
    let source = FileSource::new(&source_path);
    let snapshot = source.snapshot().with_context(|| {
        format!(
            "failed to read waystone source at {} (run `waymark init` first)",
            source_path.display()
        )
    })?;

    let engine = TooltipEngine::new(config.template_dir_at(home).as_deref())
        .context("failed to load tooltip templates")?;
    let builder = MarkerBuilder::new(engine, config.icon_size());
    let settings = SyncSettings::from(config);

    let worlds: Vec<WorldStatus> = config
        .surface
        .worlds
        .iter()
        .map(|world| world_status(world, &snapshot, settings, &builder))
        .collect();

    Ok(StatusReport {
        source: source_path.display().to_string(),
        fingerprint: fingerprint(&snapshot.records).to_string(),
        waystones: snapshot.records.len(),
        unplaced: count_unplaced(&snapshot.records, &config.surface.worlds),
        show_locked: settings.show_locked,
        worlds,
    })
}

fn world_status(
    world: &Partition,
    snapshot: &SourceSnapshot,
    settings: SyncSettings,
    builder: &MarkerBuilder,
) -> WorldStatus {
    let plan = desired_markers(snapshot, world, settings, builder);
    WorldStatus {
        id: world.id,
        name: world.name.clone(),
        markers: plan.markers.len(),
        hidden_locked: plan.hidden_locked,
        degraded: plan.degraded,
    }
}

fn count_unplaced(records: &[WaypointRecord], worlds: &[Partition]) -> usize {
    let known: BTreeSet<PartitionId> = worlds.iter().map(|w| w.id).collect();
    records
        .iter()
        .filter(|r| !known.contains(&r.partition))
        .count()
}

fn print_table(report: &StatusReport) {
    println!(
        "waymark v{} | {} waystones | {} worlds | fingerprint {}",
        env!("CARGO_PKG_VERSION"),
        report.waystones,
        report.worlds.len(),
        report.fingerprint.bold(),
    );
    println!("source: {}", report.source.bright_black());

    if report.worlds.is_empty() {
        println!("No worlds configured. Add them under `surface.worlds`.");
        return;
    }

    let rows: Vec<WorldRow> = report
        .worlds
        .iter()
        .map(|w| WorldRow {
            name: w.name.clone(),
            markers: w.markers,
            hidden_locked: w.hidden_locked,
            degraded: w.degraded,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if report.unplaced > 0 {
        println!(
            "{}",
            format!(
                "{} waystone(s) belong to worlds the surface does not know",
                report.unplaced
            )
            .yellow()
        );
    }
    if !report.show_locked {
        println!("Locked waystones are hidden (display.show_locked_waystones: false).");
    }
}
