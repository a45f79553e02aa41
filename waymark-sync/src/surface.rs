//! Rendering-surface seam.
//!
//! The surface owns, per partition, a registry of named layers. It is not
//! transactional: each call is individually atomic and the surface may drop
//! every registered layer at any time without notifying handle holders.

use std::sync::Arc;

use waymark_core::types::{LayerSpec, Marker, Partition, PartitionId};

use crate::error::SurfaceError;

/// A named set of markers rendered together within one partition.
pub trait Layer: Send + Sync {
    fn spec(&self) -> LayerSpec;

    /// Current marker set, in no meaningful order.
    fn markers(&self) -> Vec<Marker>;

    fn clear_markers(&self);

    /// Insert one marker, replacing any marker with the same key.
    fn add_marker(&self, marker: Marker);

    /// Replace the whole marker set.
    ///
    /// The default clears and then inserts one by one. Surfaces that can
    /// swap the set in a single step should override this.
    fn replace_markers(&self, markers: Vec<Marker>) {
        self.clear_markers();
        for marker in markers {
            self.add_marker(marker);
        }
    }
}

/// Per-partition layer registry of a rendering surface.
pub trait SurfaceRegistry: Send + Sync {
    /// Partitions currently known to the surface.
    fn partitions(&self) -> Vec<Partition>;

    fn partition(&self, id: &PartitionId) -> Option<Partition> {
        self.partitions().into_iter().find(|p| &p.id == id)
    }

    fn has_layer(&self, partition: &PartitionId, key: &str) -> bool {
        self.layer(partition, key).is_some()
    }

    fn layer(&self, partition: &PartitionId, key: &str) -> Option<Arc<dyn Layer>>;

    /// Register a new layer described by `spec` in `partition`.
    fn register_layer(
        &self,
        partition: &PartitionId,
        spec: &LayerSpec,
    ) -> Result<Arc<dyn Layer>, SurfaceError>;
}
