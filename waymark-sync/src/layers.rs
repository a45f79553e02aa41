//! Partition → layer ownership table.
//!
//! Read by steady-state reconciliation, written by recovery. A full
//! recovery pass rebuilds the table wholesale via [`LayerTable::replace_all`];
//! per-key updates only ever come from the pass that owns that partition.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use waymark_core::types::PartitionId;

use crate::surface::Layer;

#[derive(Default)]
pub struct LayerTable {
    inner: RwLock<HashMap<PartitionId, Arc<dyn Layer>>>,
}

impl LayerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, partition: &PartitionId) -> Option<Arc<dyn Layer>> {
        self.inner.read().get(partition).cloned()
    }

    pub fn insert(&self, partition: PartitionId, layer: Arc<dyn Layer>) {
        self.inner.write().insert(partition, layer);
    }

    pub fn remove(&self, partition: &PartitionId) -> Option<Arc<dyn Layer>> {
        self.inner.write().remove(partition)
    }

    /// Swap in a freshly built table, dropping every previous entry.
    pub fn replace_all(&self, table: HashMap<PartitionId, Arc<dyn Layer>>) {
        *self.inner.write() = table;
    }

    /// Empty the table, handing back every owned layer.
    pub fn drain(&self) -> Vec<(PartitionId, Arc<dyn Layer>)> {
        std::mem::take(&mut *self.inner.write()).into_iter().collect()
    }

    pub fn partitions(&self) -> Vec<PartitionId> {
        let mut ids: Vec<PartitionId> = self.inner.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
