use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DAEMON_LABEL: &str = "dev.waymark.daemon";
pub const DAEMON_SOCKET: &str = "waymark.sock";

/// Wait after a surface reset before querying the surface again, so its
/// own re-initialization can finish first.
pub const RESET_RECOVERY_DELAY: Duration = Duration::from_secs(1);

pub fn waymark_root(home: &Path) -> PathBuf {
    waymark_core::config::root_at(home)
}

pub fn run_dir(home: &Path) -> PathBuf {
    waymark_root(home).join("run")
}

pub fn socket_path(home: &Path) -> PathBuf {
    waymark_root(home).join(DAEMON_SOCKET)
}
