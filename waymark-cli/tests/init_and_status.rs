use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;
use uuid::Uuid;

use waymark_core::config::{self, Config};
use waymark_core::source::{load_document, save_document, SourceDocument};
use waymark_core::types::{Partition, PartitionId, Position, PrincipalId, WaypointId, WaypointRecord};

fn waymark_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("waymark"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("USER", "steve");
    cmd
}

fn waystone(name: &str, partition: PartitionId, owner: PrincipalId, locked: bool) -> WaypointRecord {
    WaypointRecord {
        id: WaypointId(Uuid::new_v4()),
        name: name.to_string(),
        owner,
        position: Position::new(10, 64, 20),
        partition,
        locked,
        created_at: Some("2024-05-01T12:00:00Z".parse().expect("timestamp")),
    }
}

#[test]
fn init_writes_config_and_empty_source() {
    let home = TempDir::new().expect("home");

    waymark_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Granted 'waystonewarps.map.reload' to steve"))
        .stdout(contains("Created waystone source"));

    let config = config::load_at(home.path()).expect("load config");
    assert!(config.operator.granted.contains("steve"));
    let document = load_document(&config.source_path_at(home.path())).expect("load source");
    assert!(document.waystones.is_empty());
}

#[test]
fn init_never_overwrites_the_source() {
    let home = TempDir::new().expect("home");
    let mut config = Config::default();
    config.display.icon_size = 32;
    config::save_at(home.path(), &config).expect("save config");

    let mut document = SourceDocument::default();
    document.waystones.push(waystone(
        "Home",
        PartitionId(Uuid::new_v4()),
        PrincipalId(Uuid::new_v4()),
        false,
    ));
    let source_path = config.source_path_at(home.path());
    save_document(&source_path, &document).expect("save source");

    waymark_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Kept existing config"))
        .stdout(contains("Kept existing waystone source"));
    assert_eq!(config::load_at(home.path()).expect("load").display.icon_size, 32);

    waymark_cmd(home.path())
        .args(["init", "--force"])
        .assert()
        .success();
    let reset = config::load_at(home.path()).expect("load");
    assert_eq!(reset.display.icon_size, 16);
    assert!(reset.operator.granted.contains("steve"));
    assert_eq!(load_document(&source_path).expect("source").waystones.len(), 1);
}

#[test]
fn status_json_reports_markers_per_world() {
    let home = TempDir::new().expect("home");
    let overworld = Partition::new(Uuid::new_v4(), "world");
    let nether = Partition::new(Uuid::new_v4(), "world_nether");

    let mut config = Config::default();
    config.surface.worlds = vec![overworld.clone(), nether.clone()];
    config.display.show_locked_waystones = false;
    config::save_at(home.path(), &config).expect("save config");

    let steve = PrincipalId(Uuid::new_v4());
    let mut document = SourceDocument::default();
    document.principals.insert(steve, "Steve".to_string());
    document.waystones = vec![
        waystone("Home", overworld.id, steve, false),
        waystone("Vault", overworld.id, steve, true),
        waystone("Portal", nether.id, PrincipalId(Uuid::new_v4()), false),
        waystone("Lost", PartitionId(Uuid::new_v4()), steve, false),
    ];
    save_document(&config.source_path_at(home.path()), &document).expect("save source");

    let output = waymark_cmd(home.path())
        .args(["status", "--json"])
        .output()
        .expect("run status");
    assert!(
        output.status.success(),
        "status failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("status JSON");
    assert_eq!(report["waystones"].as_u64(), Some(4));
    assert_eq!(report["unplaced"].as_u64(), Some(1));
    assert_eq!(report["show_locked"], false);
    assert_eq!(report["fingerprint"].as_str().map(str::len), Some(16));

    let worlds = report["worlds"].as_array().expect("worlds");
    assert_eq!(worlds[0]["name"], "world");
    assert_eq!(worlds[0]["markers"].as_u64(), Some(1));
    assert_eq!(worlds[0]["hidden_locked"].as_u64(), Some(1));
    assert_eq!(worlds[0]["degraded"].as_u64(), Some(0));
    assert_eq!(worlds[1]["name"], "world_nether");
    assert_eq!(worlds[1]["markers"].as_u64(), Some(1));
    assert_eq!(worlds[1]["degraded"].as_u64(), Some(1));
}

#[test]
fn status_table_lists_worlds() {
    let home = TempDir::new().expect("home");
    let mut config = Config::default();
    config.surface.worlds = vec![Partition::new(Uuid::new_v4(), "world")];
    config::save_at(home.path(), &config).expect("save config");
    save_document(&config.source_path_at(home.path()), &SourceDocument::default())
        .expect("save source");

    waymark_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("0 waystones"))
        .stdout(contains("world"));
}

#[test]
fn status_without_source_points_at_init() {
    let home = TempDir::new().expect("home");
    waymark_cmd(home.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(contains("waymark init"));
}

#[test]
fn commands_without_daemon() {
    let home = TempDir::new().expect("home");

    waymark_cmd(home.path())
        .arg("refresh")
        .assert()
        .failure()
        .stderr(contains("daemon is not running"));

    waymark_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains("\"running\": false"));

    waymark_cmd(home.path())
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon is not running"));
}
