#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;
use waymark_core::types::{
    LayerSpec, Partition, PartitionId, Position, PrincipalId, WaypointId, WaypointRecord,
};
use waymark_renderer::MarkerBuilder;
use waymark_sync::{
    Layer, MemorySource, MemorySurface, SurfaceError, SurfaceRegistry, SyncSettings, Synchronizer,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn world(name: &str) -> Partition {
    Partition::new(Uuid::new_v4(), name)
}

pub fn waystone(name: &str, partition: PartitionId, locked: bool, pos: (i32, i32, i32)) -> WaypointRecord {
    WaypointRecord {
        id: WaypointId(Uuid::new_v4()),
        name: name.to_string(),
        owner: PrincipalId(Uuid::new_v4()),
        position: Position::new(pos.0, pos.1, pos.2),
        partition,
        locked,
        created_at: None,
    }
}

pub fn synchronizer(
    source: Arc<MemorySource>,
    surface: Arc<dyn SurfaceRegistry>,
    show_locked: bool,
) -> Synchronizer {
    Synchronizer::new(
        source,
        surface,
        MarkerBuilder::with_defaults(16).expect("embedded templates"),
        SyncSettings { show_locked },
    )
    .expect("compatible source")
}

pub struct Fixture {
    pub worlds: Vec<Partition>,
    pub source: Arc<MemorySource>,
    pub surface: Arc<MemorySurface>,
    pub sync: Synchronizer,
}

pub fn fixture(worlds: Vec<Partition>, records: Vec<WaypointRecord>, show_locked: bool) -> Fixture {
    init_logging();
    let source = Arc::new(MemorySource::new(records));
    let surface = Arc::new(MemorySurface::new(worlds.clone()));
    let sync = synchronizer(source.clone(), surface.clone(), show_locked);
    Fixture {
        worlds,
        source,
        surface,
        sync,
    }
}

/// Surface wrapper that rejects layer registration in chosen partitions.
pub struct RejectingSurface {
    pub inner: MemorySurface,
    pub reject: Mutex<HashSet<PartitionId>>,
}

impl RejectingSurface {
    pub fn new(worlds: Vec<Partition>) -> Self {
        Self {
            inner: MemorySurface::new(worlds),
            reject: Mutex::new(HashSet::new()),
        }
    }
}

impl SurfaceRegistry for RejectingSurface {
    fn partitions(&self) -> Vec<Partition> {
        self.inner.partitions()
    }

    fn layer(&self, partition: &PartitionId, key: &str) -> Option<Arc<dyn Layer>> {
        self.inner.layer(partition, key)
    }

    fn register_layer(
        &self,
        partition: &PartitionId,
        spec: &LayerSpec,
    ) -> Result<Arc<dyn Layer>, SurfaceError> {
        if self.reject.lock().contains(partition) {
            return Err(SurfaceError::Rejected("surface not ready".into()));
        }
        self.inner.register_layer(partition, spec)
    }
}
