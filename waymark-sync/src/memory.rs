//! In-process rendering surface and waystone source.
//!
//! [`MemorySurface`] is the surface the daemon drives. Its
//! [`reset`](MemorySurface::reset) models the external reload: every
//! registered layer is discarded without telling anyone holding a handle,
//! then the reset listeners fire.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use waymark_core::error::SourceError;
use waymark_core::source::{SourceCapability, SourceSnapshot, WaypointSource, SOURCE_API_VERSION};
use waymark_core::types::{LayerSpec, Marker, Partition, PartitionId, PrincipalId, WaypointRecord};

use crate::error::SurfaceError;
use crate::publish::LayerPublisher;
use crate::surface::{Layer, SurfaceRegistry};

type ResetListener = Box<dyn Fn() + Send + Sync>;

// ---------------------------------------------------------------------------
// MemoryLayer
// ---------------------------------------------------------------------------

pub struct MemoryLayer {
    world: Partition,
    spec: LayerSpec,
    markers: RwLock<BTreeMap<String, Marker>>,
    publisher: Option<Arc<LayerPublisher>>,
}

impl MemoryLayer {
    fn new(world: Partition, spec: LayerSpec, publisher: Option<Arc<LayerPublisher>>) -> Self {
        Self {
            world,
            spec,
            markers: RwLock::new(BTreeMap::new()),
            publisher,
        }
    }

    fn publish(&self) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        let markers = self.markers();
        if let Err(e) = publisher.publish(&self.world, &self.spec, &markers) {
            tracing::warn!("failed to publish layer {} in {}: {e}", self.spec.key, self.world.name);
        }
    }
}

impl Layer for MemoryLayer {
    fn spec(&self) -> LayerSpec {
        self.spec.clone()
    }

    fn markers(&self) -> Vec<Marker> {
        self.markers.read().values().cloned().collect()
    }

    fn clear_markers(&self) {
        self.markers.write().clear();
        self.publish();
    }

    fn add_marker(&self, marker: Marker) {
        self.markers.write().insert(marker.key.clone(), marker);
        self.publish();
    }

    fn replace_markers(&self, markers: Vec<Marker>) {
        let next: BTreeMap<String, Marker> =
            markers.into_iter().map(|m| (m.key.clone(), m)).collect();
        *self.markers.write() = next;
        self.publish();
    }
}

// ---------------------------------------------------------------------------
// MemorySurface
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemorySurface {
    worlds: RwLock<Vec<Partition>>,
    layers: RwLock<HashMap<PartitionId, HashMap<String, Arc<MemoryLayer>>>>,
    listeners: RwLock<Vec<ResetListener>>,
    publisher: Option<Arc<LayerPublisher>>,
}

impl MemorySurface {
    pub fn new(worlds: Vec<Partition>) -> Self {
        Self {
            worlds: RwLock::new(worlds),
            ..Self::default()
        }
    }

    /// Mirror every layer mutation through `publisher`.
    pub fn with_publisher(mut self, publisher: LayerPublisher) -> Self {
        self.publisher = Some(Arc::new(publisher));
        self
    }

    /// Make another world known to the surface.
    pub fn add_world(&self, world: Partition) {
        let mut worlds = self.worlds.write();
        if !worlds.iter().any(|w| w.id == world.id) {
            worlds.push(world);
        }
    }

    /// Register `listener` to run after every [`reset`](Self::reset).
    pub fn on_reset(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners.write().push(Box::new(listener));
    }

    /// Discard every registered layer, then notify reset listeners.
    pub fn reset(&self) {
        let dropped: usize = std::mem::take(&mut *self.layers.write())
            .values()
            .map(HashMap::len)
            .sum();
        tracing::info!("surface reset: {dropped} layer(s) discarded");
        for listener in self.listeners.read().iter() {
            listener();
        }
    }

    /// Total registered layers across all worlds.
    pub fn layer_count(&self) -> usize {
        self.layers.read().values().map(HashMap::len).sum()
    }
}

impl SurfaceRegistry for MemorySurface {
    fn partitions(&self) -> Vec<Partition> {
        self.worlds.read().clone()
    }

    fn layer(&self, partition: &PartitionId, key: &str) -> Option<Arc<dyn Layer>> {
        let layers = self.layers.read();
        let layer = layers.get(partition)?.get(key)?.clone();
        Some(layer)
    }

    fn register_layer(
        &self,
        partition: &PartitionId,
        spec: &LayerSpec,
    ) -> Result<Arc<dyn Layer>, SurfaceError> {
        let world = self
            .partition(partition)
            .ok_or(SurfaceError::UnknownPartition(*partition))?;
        let mut layers = self.layers.write();
        let slot = layers.entry(*partition).or_default();
        if slot.contains_key(&spec.key) {
            return Err(SurfaceError::Rejected(format!(
                "layer {} already registered in {}",
                spec.key, world.name
            )));
        }
        let layer = Arc::new(MemoryLayer::new(
            world,
            spec.clone(),
            self.publisher.clone(),
        ));
        slot.insert(spec.key.clone(), Arc::clone(&layer));
        Ok(layer)
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Waystone source held in memory. Can be switched to failing reads.
#[derive(Default)]
pub struct MemorySource {
    records: RwLock<Vec<WaypointRecord>>,
    principals: RwLock<BTreeMap<PrincipalId, String>>,
    unavailable: RwLock<Option<String>>,
    api_version: Option<u32>,
    reads: AtomicUsize,
}

impl MemorySource {
    pub fn new(records: Vec<WaypointRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            ..Self::default()
        }
    }

    /// Advertise a different contract version.
    pub fn with_api_version(mut self, version: u32) -> Self {
        self.api_version = Some(version);
        self
    }

    pub fn set_records(&self, records: Vec<WaypointRecord>) {
        *self.records.write() = records;
    }

    pub fn set_principal(&self, id: PrincipalId, name: impl Into<String>) {
        self.principals.write().insert(id, name.into());
    }

    /// Snapshot reads attempted so far, failed ones included.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make every subsequent read fail with `reason`, or succeed again with `None`.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        *self.unavailable.write() = reason.map(str::to_string);
    }
}

impl WaypointSource for MemorySource {
    fn capability(&self) -> SourceCapability {
        SourceCapability {
            name: "memory".to_string(),
            api_version: self.api_version.unwrap_or(SOURCE_API_VERSION),
        }
    }

    fn snapshot(&self) -> Result<SourceSnapshot, SourceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.unavailable.read().as_ref() {
            return Err(SourceError::Unavailable(reason.clone()));
        }
        Ok(SourceSnapshot {
            records: self.records.read().clone(),
            principals: self.principals.read().clone(),
        })
    }
}
