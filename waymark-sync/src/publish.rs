//! Layer snapshot publishing.
//!
//! Each layer of the built-in surface is mirrored to
//! `<publish_dir>/<partition id>/<layer>.json` for a web map frontend to
//! poll. The directory is keyed by the partition id, not the world name, so
//! two worlds can never share a file; the name travels inside the document.
//!
//! ## Hash-gated atomic write
//!
//! 1. Serialize the snapshot (markers sorted by key).
//! 2. SHA-256 hash the serialized bytes.
//! 3. Compare with the last hash written for that path → skip if identical.
//! 4. Create the partition directory.
//! 5. Write to `<file>.json.tmp`.
//! 6. Rename to the final path (atomic on POSIX).
//! 7. Remember the new hash.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use waymark_core::types::{LayerSpec, Marker, Partition, PartitionId};

use crate::error::{io_err, SyncError};

/// Outcome of an individual snapshot write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Snapshot was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// Skipped: serialized snapshot matches the last write.
    Unchanged { path: PathBuf },
}

/// JSON document written for one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub partition: PartitionId,
    pub world: String,
    pub layer: LayerSpec,
    pub markers: Vec<Marker>,
}

pub struct LayerPublisher {
    root: PathBuf,
    hashes: Mutex<HashMap<PathBuf, String>>,
}

impl LayerPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            hashes: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<partition id>/<layer key>.json`
    pub fn snapshot_path(&self, partition: &PartitionId, layer_key: &str) -> PathBuf {
        self.root
            .join(partition.to_string())
            .join(format!("{}.json", path_segment(layer_key)))
    }

    pub fn publish(
        &self,
        world: &Partition,
        spec: &LayerSpec,
        markers: &[Marker],
    ) -> Result<WriteResult, SyncError> {
        let mut markers = markers.to_vec();
        markers.sort_by(|a, b| a.key.cmp(&b.key));
        let snapshot = LayerSnapshot {
            partition: world.id,
            world: world.name.clone(),
            layer: spec.clone(),
            markers,
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        let path = self.snapshot_path(&world.id, &spec.key);
        let tmp = path.with_extension("json.tmp");
        self.write_with_tmp(&path, &content, &tmp)
    }

    fn write_with_tmp(&self, path: &Path, content: &str, tmp: &Path) -> Result<WriteResult, SyncError> {
        let digest = hex::encode(Sha256::digest(content.as_bytes()));

        let mut hashes = self.hashes.lock();
        if hashes.get(path) == Some(&digest) {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;
        if let Err(e) = std::fs::rename(tmp, path) {
            let _ = std::fs::remove_file(tmp);
            return Err(io_err(path, e));
        }

        hashes.insert(path.to_path_buf(), digest);
        tracing::info!("published: {}", path.display());
        Ok(WriteResult::Written {
            path: path.to_path_buf(),
        })
    }
}

/// Replace anything outside `[A-Za-z0-9._-]` so a layer key can never
/// escape its partition directory.
fn path_segment(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}
