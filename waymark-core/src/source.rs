//! Waystone source contract and the YAML file-backed source.
//!
//! The source repository is owned by another component. Consumers reach it
//! only through [`WaypointSource`], whose [`SourceCapability`] names the
//! published API version; a consumer refuses a source whose version it does
//! not speak instead of poking at the owner's internals.
//!
//! # File layout
//!
//! ```yaml
//! version: 1
//! principals:
//!   2f0c…: Steve
//! waystones:
//!   - id: 6a1e…
//!     name: Home
//!     owner: 2f0c…
//!     position: { x: 10, y: 64, z: 20 }
//!     partition: 9b7d…
//!     locked: false
//!     created_at: 2024-05-01T12:00:00Z
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{source_io, SourceError};
use crate::types::{PrincipalId, WaypointRecord};

/// API version of the waystone source contract spoken by this workspace.
pub const SOURCE_API_VERSION: u32 = 1;

/// Published capability of a waystone source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCapability {
    pub name: String,
    pub api_version: u32,
}

/// One read of the source: the records plus the principal names they refer
/// to, taken together so a reconciliation never mixes two versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub records: Vec<WaypointRecord>,
    pub principals: BTreeMap<PrincipalId, String>,
}

impl SourceSnapshot {
    /// Display name of a principal, when the snapshot carries it.
    pub fn principal_name(&self, id: &PrincipalId) -> Option<&str> {
        self.principals.get(id).map(String::as_str)
    }
}

impl From<SourceDocument> for SourceSnapshot {
    fn from(document: SourceDocument) -> Self {
        Self {
            records: document.waystones,
            principals: document.principals,
        }
    }
}

/// Read access to the authoritative set of waystone records.
pub trait WaypointSource: Send + Sync {
    fn capability(&self) -> SourceCapability;

    /// Current records and principal names from a single read. Record order
    /// carries no meaning, and two successive calls may disagree.
    fn snapshot(&self) -> Result<SourceSnapshot, SourceError>;

    /// Current records only.
    fn all(&self) -> Result<Vec<WaypointRecord>, SourceError> {
        Ok(self.snapshot()?.records)
    }
}

// ---------------------------------------------------------------------------
// File-backed source
// ---------------------------------------------------------------------------

/// On-disk document read by [`FileSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub principals: BTreeMap<PrincipalId, String>,
    #[serde(default)]
    pub waystones: Vec<WaypointRecord>,
}

fn default_version() -> u32 {
    SOURCE_API_VERSION
}

impl Default for SourceDocument {
    fn default() -> Self {
        Self {
            version: SOURCE_API_VERSION,
            principals: BTreeMap::new(),
            waystones: Vec::new(),
        }
    }
}

/// Waystone source backed by a YAML file, re-read on every call.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole document.
    pub fn load(&self) -> Result<SourceDocument, SourceError> {
        load_document(&self.path)
    }
}

impl WaypointSource for FileSource {
    fn capability(&self) -> SourceCapability {
        SourceCapability {
            name: format!("file:{}", self.path.display()),
            api_version: SOURCE_API_VERSION,
        }
    }

    fn snapshot(&self) -> Result<SourceSnapshot, SourceError> {
        Ok(self.load()?.into())
    }
}

/// Parse a source document from `path`.
pub fn load_document(path: &Path) -> Result<SourceDocument, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| source_io(path, e))?;
    if contents.trim().is_empty() {
        return Ok(SourceDocument::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| SourceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically write a source document to `path` (`.tmp` sibling + rename).
pub fn save_document(path: &Path, document: &SourceDocument) -> Result<(), SourceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| source_io(parent, e))?;
    }
    let tmp = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(document)?;
    std::fs::write(&tmp, yaml).map_err(|e| source_io(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(source_io(path, e));
    }
    Ok(())
}
