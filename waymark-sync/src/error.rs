//! Error types for waymark-sync.

use std::path::PathBuf;

use thiserror::Error;

use waymark_core::error::SourceError;
use waymark_core::types::PartitionId;
use waymark_renderer::RenderError;

/// All errors that can arise from synchronization.
///
/// None of these is fatal to the process: every variant leaves markers at
/// worst stale until the next scheduled or triggered pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The waystone source could not be read. The pass is aborted and the
    /// markers already on the map stay visible.
    #[error("waystone source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    /// The partition has no registered waystone layer (or is unknown to the
    /// surface). Route to recovery.
    #[error("partition {partition} is not synchronized")]
    NotSynchronized { partition: PartitionId },

    /// The surface rejected the layer registration. Retried next trigger.
    #[error("layer registration failed for partition {partition}: {reason}")]
    RegistrationFailed {
        partition: PartitionId,
        reason: String,
    },

    /// The source speaks a contract version this crate does not.
    #[error("incompatible waystone source {name}: api version {version}")]
    IncompatibleSource { name: String, version: u32 },

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (layer snapshots).
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors reported by a rendering surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("unknown partition {0}")]
    UnknownPartition(PartitionId),

    #[error("{0}")]
    Rejected(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
