//! YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.waymark/
//!   config.yaml      (mode 0600, written by `waymark init`)
//!   waystones.yaml   (default file-backed waystone source)
//! ```
//!
//! # API pattern
//!
//! Every function that touches disk has two forms:
//! - `fn_at(home: &Path, …)`: explicit home, used by tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()` and delegates to `_at`

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{config_io, ConfigError};
use crate::types::Partition;

/// Largest icon size accepted from configuration, in pixels.
pub const MAX_ICON_SIZE: u32 = 64;
pub const DEFAULT_ICON_SIZE: u32 = 16;
pub const DEFAULT_REFRESH_INTERVAL_SECS: i64 = 60;
pub const DEFAULT_RELOAD_PERMISSION: &str = "waystonewarps.map.reload";

// ---------------------------------------------------------------------------
// Config document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub auto_refresh: AutoRefreshConfig,
    pub source: SourceConfig,
    pub surface: SurfaceConfig,
    pub operator: OperatorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Render locked (private) waystones. Locked markers use the locked icon.
    pub show_locked_waystones: bool,
    pub icon_size: u32,
    /// Directory of `.tera` files overriding the embedded tooltip templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_locked_waystones: true,
            icon_size: DEFAULT_ICON_SIZE,
            template_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoRefreshConfig {
    pub enabled: bool,
    /// Seconds between change checks. `<= 0` disables the timer.
    pub interval: i64,
}

impl Default for AutoRefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Waystone source file. Relative paths resolve against `~/.waymark`.
    pub path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("waystones.yaml"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SurfaceConfig {
    pub worlds: Vec<Partition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub permission: String,
    /// Actors holding `permission`.
    pub granted: BTreeSet<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            permission: DEFAULT_RELOAD_PERMISSION.to_string(),
            granted: BTreeSet::new(),
        }
    }
}

impl Config {
    /// Icon size clamped to `1..=MAX_ICON_SIZE`.
    pub fn icon_size(&self) -> u32 {
        self.display.icon_size.clamp(1, MAX_ICON_SIZE)
    }

    /// Change-check interval, or `None` when the timer must not run.
    pub fn effective_refresh_interval(&self) -> Option<Duration> {
        if !self.auto_refresh.enabled || self.auto_refresh.interval <= 0 {
            return None;
        }
        Some(Duration::from_secs(self.auto_refresh.interval as u64))
    }

    /// Absolute path of the waystone source file.
    pub fn source_path_at(&self, home: &Path) -> PathBuf {
        resolve(home, &self.source.path)
    }

    /// Absolute path of the tooltip template override directory, if any.
    pub fn template_dir_at(&self, home: &Path) -> Option<PathBuf> {
        self.display
            .template_dir
            .as_ref()
            .map(|dir| resolve(home, dir))
    }

    /// Absolute path of the publish directory, if publishing is configured.
    pub fn publish_dir_at(&self, home: &Path) -> Option<PathBuf> {
        self.surface
            .publish_dir
            .as_ref()
            .map(|dir| resolve(home, dir))
    }
}

fn resolve(home: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root_at(home).join(path)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.waymark`
pub fn root_at(home: &Path) -> PathBuf {
    home.join(".waymark")
}

/// `<home>/.waymark/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    root_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load configuration from `<home>/.waymark/config.yaml`.
///
/// A missing file yields [`Config::default`]. A malformed file is a
/// [`ConfigError::Parse`] carrying the path.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| config_io(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

/// Atomically write `config` to `<home>/.waymark/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &Config) -> Result<PathBuf, ConfigError> {
    let root = root_at(home);
    if !root.exists() {
        std::fs::create_dir_all(&root).map_err(|e| config_io(&root, e))?;
        set_dir_permissions(&root)?;
    }
    let path = config_path_at(home);
    let tmp = path.with_extension("yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml).map_err(|e| config_io(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| config_io(&path, e))?;
    Ok(path)
}

/// Write the default config unless one already exists (or `force` is set).
///
/// Returns the existing or freshly written config.
pub fn write_default_at(home: &Path, force: bool) -> Result<Config, ConfigError> {
    if config_path_at(home).exists() && !force {
        return load_at(home);
    }
    let config = Config::default();
    save_at(home, &config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub(crate) fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| config_io(path, e))
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| config_io(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
