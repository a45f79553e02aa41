//! Synchronizer and the shared pipeline entrypoint used by the daemon and
//! the CLI.
//!
//! Every trigger (change detector, surface reset, operator refresh) goes
//! through [`Synchronizer::run`]. Recovery and steady-state reconciliation
//! share one path: make sure the layer exists, then replace its markers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use waymark_core::source::{WaypointSource, SOURCE_API_VERSION};
use waymark_core::types::PartitionId;
use waymark_core::Config;
use waymark_renderer::MarkerBuilder;

use crate::error::SyncError;
use crate::layers::LayerTable;
use crate::recovery::{LayerAction, PartitionRecovery, RecoveryReport};
use crate::surface::SurfaceRegistry;

/// Scope for a sync pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncScope {
    /// Re-enumerate the surface's partitions and recover every one.
    All,
    /// Reconcile one partition, recovering it first if its layer is gone.
    Partition(PartitionId),
}

/// Visibility policy applied before markers are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub show_locked: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self { show_locked: true }
    }
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self {
            show_locked: config.display.show_locked_waystones,
        }
    }
}

pub struct Synchronizer {
    pub(crate) source: Arc<dyn WaypointSource>,
    pub(crate) surface: Arc<dyn SurfaceRegistry>,
    pub(crate) builder: MarkerBuilder,
    pub(crate) settings: SyncSettings,
    pub(crate) table: LayerTable,
    shut_down: AtomicBool,
}

impl Synchronizer {
    /// Refuses a source whose published contract version differs from
    /// [`SOURCE_API_VERSION`].
    pub fn new(
        source: Arc<dyn WaypointSource>,
        surface: Arc<dyn SurfaceRegistry>,
        builder: MarkerBuilder,
        settings: SyncSettings,
    ) -> Result<Self, SyncError> {
        let capability = source.capability();
        if capability.api_version != SOURCE_API_VERSION {
            return Err(SyncError::IncompatibleSource {
                name: capability.name,
                version: capability.api_version,
            });
        }
        tracing::debug!(
            "waystone source {} (api v{})",
            capability.name,
            capability.api_version
        );
        Ok(Self {
            source,
            surface,
            builder,
            settings,
            table: LayerTable::new(),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn source(&self) -> &Arc<dyn WaypointSource> {
        &self.source
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    /// Partitions whose layer this synchronizer currently owns.
    pub fn owned_partitions(&self) -> Vec<PartitionId> {
        self.table.partitions()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Run the sync pipeline for a scope.
    pub fn run(&self, scope: SyncScope) -> Result<RecoveryReport, SyncError> {
        if self.is_shut_down() {
            tracing::debug!("sync skipped: synchronizer is shut down");
            return Ok(RecoveryReport::default());
        }
        match scope {
            SyncScope::All => Ok(self.recover_all()),
            SyncScope::Partition(id) => {
                let recovered = match self.reconcile(&id) {
                    Ok(outcome) => PartitionRecovery {
                        partition: outcome.partition,
                        world: outcome.world,
                        action: LayerAction::Kept,
                        placed: outcome.placed,
                    },
                    Err(SyncError::NotSynchronized { .. }) => {
                        tracing::info!("partition {id} has no waystone layer; recovering");
                        self.recover_partition(&id)?
                    }
                    Err(e) => return Err(e),
                };
                Ok(RecoveryReport {
                    recovered: vec![recovered],
                    failed: vec![],
                })
            }
        }
    }

    /// Stop synchronizing and clear every owned layer.
    ///
    /// Only the first call clears anything; returns whether this call did.
    pub fn shutdown(&self) -> bool {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return false;
        }
        let owned = self.table.drain();
        for (_, layer) in &owned {
            layer.clear_markers();
        }
        tracing::info!("cleared {} waystone layer(s) on shutdown", owned.len());
        true
    }
}
