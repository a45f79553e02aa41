//! # waymark-sync
//!
//! Keeps each world's waystone layer on the map in step with the waystone
//! source.
//!
//! - [`ChangeDetector`] fingerprints the source snapshot on a timer.
//! - [`Synchronizer::reconcile`] rebuilds one partition's marker set.
//! - [`Synchronizer::recover_all`] re-registers layers the surface dropped.
//!
//! All three triggers go through [`Synchronizer::run`].

pub mod detector;
pub mod error;
pub mod fingerprint;
pub mod layers;
pub mod memory;
pub mod pipeline;
pub mod publish;
pub mod reconcile;
pub mod recovery;
pub mod surface;

pub use detector::{ChangeDetector, TickOutcome};
pub use error::{SurfaceError, SyncError};
pub use fingerprint::{fingerprint, record_hash, Fingerprint};
pub use layers::LayerTable;
pub use memory::{MemoryLayer, MemorySource, MemorySurface};
pub use pipeline::{SyncScope, SyncSettings, Synchronizer};
pub use publish::{LayerPublisher, LayerSnapshot, WriteResult};
pub use reconcile::{desired_markers, MarkerPlan, ReconcileOutcome};
pub use recovery::{LayerAction, PartitionRecovery, RecoveryFailure, RecoveryReport};
pub use surface::{Layer, SurfaceRegistry};
