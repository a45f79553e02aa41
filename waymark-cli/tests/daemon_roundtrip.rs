use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use uuid::Uuid;

use waymark_core::config::{self, Config};
use waymark_core::source::{save_document, SourceDocument};
use waymark_core::types::{Partition, PartitionId, Position, PrincipalId, WaypointId, WaypointRecord};

const BIN: &str = env!("CARGO_BIN_EXE_waymark");

fn waymark(home: &Path, args: &[&str]) -> Output {
    Command::new(BIN)
        .env("HOME", home)
        .env("USERPROFILE", home)
        .env("USER", "steve")
        .args(args)
        .output()
        .expect("run waymark")
}

struct DaemonProcess {
    child: Child,
    home: PathBuf,
}

impl DaemonProcess {
    fn start(home: &Path) -> Self {
        let child = Command::new(BIN)
            .env("HOME", home)
            .env("USERPROFILE", home)
            .env("RUST_LOG", "warn")
            .args(["daemon", "start"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");
        Self {
            child,
            home: home.to_path_buf(),
        }
    }

    /// Ask the daemon to stop and wait for the process to exit.
    fn stop(&mut self) -> bool {
        let _ = waymark(&self.home, &["daemon", "stop"]);
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return true;
            }
            sleep(Duration::from_millis(50));
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
        false
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            self.stop();
        }
    }
}

fn daemon_status(home: &Path) -> Option<serde_json::Value> {
    let output = waymark(home, &["daemon", "status"]);
    if !output.status.success() {
        return None;
    }
    serde_json::from_slice(&output.stdout).ok()
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(100));
    }
    false
}

fn published_markers(snapshot: &Path) -> Option<usize> {
    let raw = std::fs::read_to_string(snapshot).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    value["markers"].as_array().map(Vec::len)
}

fn waystone(name: &str, partition: PartitionId) -> WaypointRecord {
    WaypointRecord {
        id: WaypointId(Uuid::new_v4()),
        name: name.to_string(),
        owner: PrincipalId(Uuid::new_v4()),
        position: Position::new(10, 64, 20),
        partition,
        locked: false,
        created_at: None,
    }
}

#[test]
fn daemon_places_refreshes_recovers_and_clears_markers() {
    let home = TempDir::new().expect("home");
    let world = Partition::new(Uuid::new_v4(), "world");

    let mut config = Config::default();
    config.surface.worlds = vec![world.clone()];
    config.surface.publish_dir = Some(PathBuf::from("map"));
    config.auto_refresh.interval = 1;
    config.operator.granted.insert("steve".to_string());
    config::save_at(home.path(), &config).expect("save config");

    let source_path = config.source_path_at(home.path());
    let mut document = SourceDocument::default();
    document.waystones.push(waystone("Home", world.id));
    save_document(&source_path, &document).expect("save source");

    let snapshot = config::root_at(home.path())
        .join("map")
        .join(world.id.to_string())
        .join("waystones.json");

    let mut daemon = DaemonProcess::start(home.path());
    assert!(
        wait_until(Duration::from_secs(10), || daemon_status(home.path())
            .map(|s| s["running"] == true)
            .unwrap_or(false)),
        "daemon did not report running state in time",
    );
    assert!(
        wait_until(Duration::from_secs(5), || published_markers(&snapshot) == Some(1)),
        "initial sync did not publish the waystone layer",
    );

    let refresh = waymark(home.path(), &["refresh", "--as", "steve"]);
    let stdout = String::from_utf8_lossy(&refresh.stdout);
    assert!(refresh.status.success(), "refresh failed: {}", String::from_utf8_lossy(&refresh.stderr));
    assert!(stdout.contains("Refreshing waystone markers on the map..."), "got: {stdout}");
    assert!(stdout.contains("Waystone markers refreshed successfully!"), "got: {stdout}");

    let denied = waymark(home.path(), &["refresh", "--as", "mallory"]);
    assert!(!denied.status.success());
    assert!(String::from_utf8_lossy(&denied.stderr)
        .contains("You don't have permission to use this command."));

    document.waystones.push(waystone("Farm", world.id));
    save_document(&source_path, &document).expect("update source");
    assert!(
        wait_until(Duration::from_secs(10), || published_markers(&snapshot) == Some(2)),
        "source change was not picked up by the change check",
    );

    let reload = waymark(home.path(), &["daemon", "reload-surface", "--as", "steve"]);
    assert!(reload.status.success(), "reload failed: {}", String::from_utf8_lossy(&reload.stderr));
    assert!(
        wait_until(Duration::from_secs(10), || daemon_status(home.path())
            .map(|s| s["last_sync"]["trigger"] == "reset" && s["worlds"][0]["layer"] == true)
            .unwrap_or(false)),
        "waystone layer was not recovered after the surface reload",
    );
    assert_eq!(published_markers(&snapshot), Some(2));

    assert!(daemon.stop(), "daemon did not exit after stop");
    assert_eq!(published_markers(&snapshot), Some(0), "shutdown must clear the layer");
}
