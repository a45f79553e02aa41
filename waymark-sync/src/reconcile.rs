//! Steady-state reconciliation of one partition's waystone layer.

use std::sync::Arc;

use waymark_core::source::SourceSnapshot;
use waymark_core::types::{Marker, Partition, PartitionId, WAYSTONE_LAYER_KEY};
use waymark_renderer::{DisplayNames, MarkerBuilder};

use crate::error::SyncError;
use crate::pipeline::{SyncSettings, Synchronizer};
use crate::surface::Layer;

/// The marker set a partition's layer should hold for one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerPlan {
    pub markers: Vec<Marker>,
    /// Locked records left off the map by the visibility policy.
    pub hidden_locked: usize,
    /// Records rendered with at least one placeholder field.
    pub degraded: usize,
}

/// Filter `snapshot` down to `partition`, apply the locked-waystone policy
/// and build one marker per survivor. Owner names come from the same
/// snapshot as the records.
pub fn desired_markers(
    snapshot: &SourceSnapshot,
    partition: &Partition,
    settings: SyncSettings,
    builder: &MarkerBuilder,
) -> MarkerPlan {
    let world = (!partition.name.trim().is_empty()).then(|| partition.name.clone());
    let mut plan = MarkerPlan::default();

    for record in snapshot.records.iter().filter(|r| r.partition == partition.id) {
        if record.locked && !settings.show_locked {
            plan.hidden_locked += 1;
            continue;
        }
        let owner = snapshot.principal_name(&record.owner).map(str::to_string);
        let built = builder.build(record, &DisplayNames::new(owner, world.clone()));
        if built.is_degraded() {
            tracing::debug!(
                "waystone {} rendered with placeholders: {:?}",
                record.id,
                built.degraded
            );
            plan.degraded += 1;
        }
        plan.markers.push(built.marker);
    }
    plan
}

/// Result of one successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub partition: PartitionId,
    pub world: String,
    pub placed: usize,
    pub hidden_locked: usize,
    pub degraded: usize,
}

impl Synchronizer {
    /// Replace the marker set of `partition`'s waystone layer with the image
    /// of the current source snapshot.
    ///
    /// The layer is looked up in the surface registry, not the local table:
    /// a reset empties the registry without touching the table. When the
    /// layer (or the partition) is missing this fails with
    /// [`SyncError::NotSynchronized`] and nothing is mutated.
    pub fn reconcile(&self, partition: &PartitionId) -> Result<ReconcileOutcome, SyncError> {
        let not_synced = || SyncError::NotSynchronized {
            partition: *partition,
        };
        let Some(world) = self.surface.partition(partition) else {
            self.table.remove(partition);
            return Err(not_synced());
        };
        let Some(layer) = self.surface.layer(partition, WAYSTONE_LAYER_KEY) else {
            self.table.remove(partition);
            return Err(not_synced());
        };
        self.reconcile_layer(&world, &layer)
    }

    /// Shared by reconciliation and recovery: read the snapshot, build the
    /// complete replacement set, then swap it in as one step.
    pub(crate) fn reconcile_layer(
        &self,
        world: &Partition,
        layer: &Arc<dyn Layer>,
    ) -> Result<ReconcileOutcome, SyncError> {
        let snapshot = self.source.snapshot()?;
        let plan = desired_markers(&snapshot, world, self.settings, &self.builder);
        let placed = plan.markers.len();
        layer.replace_markers(plan.markers);
        self.table.insert(world.id, Arc::clone(layer));

        tracing::info!("placed {placed} waystone marker(s) in {}", world.name);
        Ok(ReconcileOutcome {
            partition: world.id,
            world: world.name.clone(),
            placed,
            hidden_locked: plan.hidden_locked,
            degraded: plan.degraded,
        })
    }
}
