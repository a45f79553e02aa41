//! Recovery after the rendering surface dropped its registered layers.
//!
//! The partition list is re-read from the surface on every pass, and layer
//! existence is checked against the surface registry, never the local
//! table. Running a pass twice in a row therefore ends in the same layer
//! set as running it once.

use std::collections::HashMap;
use std::sync::Arc;

use waymark_core::types::{LayerSpec, Partition, PartitionId, WAYSTONE_LAYER_KEY};

use crate::error::SyncError;
use crate::pipeline::Synchronizer;
use crate::surface::Layer;

/// How a partition's waystone layer was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerAction {
    /// The layer was missing and has been registered.
    Registered,
    /// The layer already existed in the surface and was taken over.
    Adopted,
    /// The layer was already owned; only its markers were replaced.
    Kept,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRecovery {
    pub partition: PartitionId,
    pub world: String,
    pub action: LayerAction,
    pub placed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryFailure {
    pub partition: PartitionId,
    pub world: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub recovered: Vec<PartitionRecovery>,
    pub failed: Vec<RecoveryFailure>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total_markers(&self) -> usize {
        self.recovered.iter().map(|r| r.placed).sum()
    }

    pub fn registered(&self) -> usize {
        self.recovered
            .iter()
            .filter(|r| r.action == LayerAction::Registered)
            .count()
    }
}

impl Synchronizer {
    /// Re-establish the waystone layer of every partition the surface knows
    /// and reconcile each one.
    ///
    /// A failure in one partition is logged and recorded in the report; the
    /// remaining partitions are still recovered. The ownership table is
    /// rebuilt from the layers this pass obtained.
    pub fn recover_all(&self) -> RecoveryReport {
        let mut report = RecoveryReport::default();
        let mut owned: HashMap<PartitionId, Arc<dyn Layer>> = HashMap::new();

        for world in self.surface.partitions() {
            let (layer, action) = match self.ensure_layer(&world) {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!("failed to recover waystone layer in {}: {e}", world.name);
                    report.failed.push(failure(&world, &e));
                    continue;
                }
            };
            owned.insert(world.id, Arc::clone(&layer));
            match self.reconcile_layer(&world, &layer) {
                Ok(outcome) => report.recovered.push(PartitionRecovery {
                    partition: world.id,
                    world: world.name.clone(),
                    action,
                    placed: outcome.placed,
                }),
                Err(e) => {
                    tracing::warn!("failed to reconcile {} after recovery: {e}", world.name);
                    report.failed.push(failure(&world, &e));
                }
            }
        }

        self.table.replace_all(owned);
        tracing::info!(
            "recovery complete: {} partition(s), {} registered, {} marker(s), {} failure(s)",
            report.recovered.len(),
            report.registered(),
            report.total_markers(),
            report.failed.len()
        );
        report
    }

    /// Re-establish and reconcile a single partition.
    pub fn recover_partition(&self, partition: &PartitionId) -> Result<PartitionRecovery, SyncError> {
        let Some(world) = self.surface.partition(partition) else {
            self.table.remove(partition);
            return Err(SyncError::NotSynchronized {
                partition: *partition,
            });
        };
        let (layer, action) = self.ensure_layer(&world)?;
        let outcome = self.reconcile_layer(&world, &layer)?;
        Ok(PartitionRecovery {
            partition: world.id,
            world: world.name,
            action,
            placed: outcome.placed,
        })
    }

    fn ensure_layer(&self, world: &Partition) -> Result<(Arc<dyn Layer>, LayerAction), SyncError> {
        if let Some(existing) = self.surface.layer(&world.id, WAYSTONE_LAYER_KEY) {
            tracing::debug!("adopted waystone layer in {}", world.name);
            return Ok((existing, LayerAction::Adopted));
        }
        let layer = self
            .surface
            .register_layer(&world.id, &LayerSpec::waystones())
            .map_err(|e| SyncError::RegistrationFailed {
                partition: world.id,
                reason: e.to_string(),
            })?;
        tracing::info!("registered waystone layer in {}", world.name);
        Ok((layer, LayerAction::Registered))
    }
}

fn failure(world: &Partition, error: &SyncError) -> RecoveryFailure {
    RecoveryFailure {
        partition: world.id,
        world: world.name.clone(),
        error: error.to_string(),
    }
}
