//! Append-only registry of matrix slots.
//!
//! Every slot pairs a source matrix with at most one cached inverse. The
//! registry hands out dense, 1-based [`SlotId`]s and never removes a slot, so
//! an id stays valid for as long as the registry lives.

use std::fmt;
use std::sync::Arc;

use invcache_matrix::Matrix;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::metrics::CacheMetrics;

/// Handle to a slot. Only meaningful for the registry that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(u64);

impl SlotId {
    /// Returns `None` for 0, which is never a valid id.
    pub fn new(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()?.checked_sub(1)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Slot {
    matrix: Option<Matrix>,
    inverse: Option<Matrix>,
    /// Bumped on every matrix replacement.
    generation: u64,
}

impl Slot {
    fn new(matrix: Option<Matrix>) -> Self {
        Self {
            matrix,
            inverse: None,
            generation: 0,
        }
    }

    pub(crate) fn matrix(&self) -> Option<&Matrix> {
        self.matrix.as_ref()
    }

    pub(crate) fn inverse(&self) -> Option<&Matrix> {
        self.inverse.as_ref()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns whether a cached inverse was dropped.
    fn replace_matrix(&mut self, matrix: Matrix) -> bool {
        self.matrix = Some(matrix);
        self.generation += 1;
        self.inverse.take().is_some()
    }

    pub(crate) fn store_inverse(&mut self, inverse: Matrix) {
        self.inverse = Some(inverse);
    }
}

#[derive(Debug, Default)]
pub struct SlotRegistry {
    slots: RwLock<Vec<Arc<Mutex<Slot>>>>,
    metrics: CacheMetrics,
    config: CacheConfig,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn create_slot(&self, initial: Option<Matrix>) -> SlotId {
        let with_matrix = initial.is_some();
        let id = {
            let mut slots = self.slots.write();
            slots.push(Arc::new(Mutex::new(Slot::new(initial))));
            SlotId(slots.len() as u64)
        };
        self.metrics.record_slot_created();
        trace!(slot = %id, with_matrix, "slot created");
        id
    }

    /// Replaces the slot's matrix and drops its cached inverse, even when the
    /// new matrix equals the old one.
    pub fn set_matrix(&self, id: SlotId, matrix: Matrix) -> Result<(), CacheError> {
        let slot = self.slot(id)?;
        let dropped = slot.lock().replace_matrix(matrix);
        self.metrics.record_invalidation();
        debug!(slot = %id, dropped_inverse = dropped, "matrix replaced");
        Ok(())
    }

    pub fn get_matrix(&self, id: SlotId) -> Result<Option<Matrix>, CacheError> {
        Ok(self.slot(id)?.lock().matrix().cloned())
    }

    pub fn get_inverse(&self, id: SlotId) -> Result<Option<Matrix>, CacheError> {
        Ok(self.slot(id)?.lock().inverse().cloned())
    }

    /// Overwrites the cached inverse without checking it against the matrix.
    ///
    /// Only the get-or-compute path should call this, right after inverting
    /// the slot's current matrix. Anything else can leave an inverse cached
    /// that does not belong to the matrix.
    pub fn store_inverse(&self, id: SlotId, inverse: Matrix) -> Result<(), CacheError> {
        self.slot(id)?.lock().store_inverse(inverse);
        debug!(slot = %id, "inverse stored");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    pub fn contains(&self, id: SlotId) -> bool {
        id.index().is_some_and(|index| index < self.len())
    }

    /// All issued ids in creation order.
    pub fn ids(&self) -> Vec<SlotId> {
        (1..=self.len() as u64).map(SlotId).collect()
    }

    /// Shared handle to one slot. The registry lock is released before the
    /// caller touches the slot, so work on different slots never contends.
    pub(crate) fn slot(&self, id: SlotId) -> Result<Arc<Mutex<Slot>>, CacheError> {
        id.index()
            .and_then(|index| self.slots.read().get(index).cloned())
            .ok_or(CacheError::InvalidSlot(id))
    }
}
