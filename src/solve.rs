use std::sync::Arc;

use invcache_matrix::{GaussJordan, InvertOptions, Inverter, Matrix};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::LockStrategy;
use crate::error::CacheError;
use crate::registry::{Slot, SlotId, SlotRegistry};

/// How a successful solve was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lookup {
    Hit,
    /// Computed and cached.
    Computed,
    /// Computed, but the matrix was replaced mid-computation so the result
    /// was not cached.
    Uncached,
    /// Computed, but a concurrent solve cached the same matrix's inverse
    /// first. The cached value is returned and this result is dropped.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solved {
    pub inverse: Matrix,
    pub lookup: Lookup,
}

/// Returns the slot's inverse, computing and caching it on a miss.
///
/// A hit returns the cached value as stored. A miss on a slot without a
/// matrix fails with [`CacheError::NoMatrixSet`] and does not call the
/// inverter. Inversion failures are returned as
/// [`CacheError::InversionFailed`] and leave the cache empty.
pub fn cache_solve<I>(
    registry: &SlotRegistry,
    id: SlotId,
    inverter: &I,
    options: &InvertOptions,
) -> Result<Matrix, CacheError>
where
    I: Inverter + ?Sized,
{
    cache_solve_outcome(registry, id, inverter, options).map(|solved| solved.inverse)
}

pub fn cache_solve_outcome<I>(
    registry: &SlotRegistry,
    id: SlotId,
    inverter: &I,
    options: &InvertOptions,
) -> Result<Solved, CacheError>
where
    I: Inverter + ?Sized,
{
    let slot = registry.slot(id)?;
    match registry.config().lock_strategy {
        LockStrategy::UnderLock => solve_under_lock(registry, id, &slot, inverter, options),
        LockStrategy::Optimistic => solve_optimistic(registry, id, &slot, inverter, options),
    }
}

/// Solves each id in parallel; results come back in the order of `ids`.
pub fn cache_solve_many<I>(
    registry: &SlotRegistry,
    ids: &[SlotId],
    inverter: &I,
    options: &InvertOptions,
) -> Vec<Result<Matrix, CacheError>>
where
    I: Inverter + ?Sized,
{
    ids.par_iter()
        .map(|&id| cache_solve(registry, id, inverter, options))
        .collect()
}

fn solve_under_lock<I>(
    registry: &SlotRegistry,
    id: SlotId,
    slot: &Mutex<Slot>,
    inverter: &I,
    options: &InvertOptions,
) -> Result<Solved, CacheError>
where
    I: Inverter + ?Sized,
{
    let mut guard = slot.lock();
    if let Some(inverse) = guard.inverse() {
        return Ok(hit(registry, id, inverse));
    }
    registry.metrics().record_miss();

    let matrix = guard.matrix().ok_or(CacheError::NoMatrixSet(id))?;
    let inverse = compute(registry, id, matrix, inverter, options)?;
    guard.store_inverse(inverse.clone());
    debug!(slot = %id, "inverse cached");
    Ok(Solved {
        inverse,
        lookup: Lookup::Computed,
    })
}

fn solve_optimistic<I>(
    registry: &SlotRegistry,
    id: SlotId,
    slot: &Mutex<Slot>,
    inverter: &I,
    options: &InvertOptions,
) -> Result<Solved, CacheError>
where
    I: Inverter + ?Sized,
{
    let (matrix, generation) = {
        let guard = slot.lock();
        if let Some(inverse) = guard.inverse() {
            return Ok(hit(registry, id, inverse));
        }
        registry.metrics().record_miss();
        let matrix = guard.matrix().ok_or(CacheError::NoMatrixSet(id))?;
        (matrix.clone(), guard.generation())
    };

    let inverse = compute(registry, id, &matrix, inverter, options)?;

    let mut guard = slot.lock();
    if guard.generation() != generation {
        registry.metrics().record_discarded();
        warn!(
            slot = %id,
            generation,
            current = guard.generation(),
            "matrix replaced during inversion; result not cached"
        );
        return Ok(Solved {
            inverse,
            lookup: Lookup::Uncached,
        });
    }

    // A concurrent solve of the same matrix may have finished first; keep its
    // value so every caller sees the same cached inverse.
    if let Some(existing) = guard.inverse() {
        registry.metrics().record_discarded();
        debug!(slot = %id, generation, "inverse already cached by another solve");
        return Ok(Solved {
            inverse: existing.clone(),
            lookup: Lookup::Superseded,
        });
    }

    guard.store_inverse(inverse.clone());
    debug!(slot = %id, generation, "inverse cached");
    Ok(Solved {
        inverse,
        lookup: Lookup::Computed,
    })
}

fn hit(registry: &SlotRegistry, id: SlotId, inverse: &Matrix) -> Solved {
    registry.metrics().record_hit();
    debug!(slot = %id, "cache hit");
    Solved {
        inverse: inverse.clone(),
        lookup: Lookup::Hit,
    }
}

fn compute<I>(
    registry: &SlotRegistry,
    id: SlotId,
    matrix: &Matrix,
    inverter: &I,
    options: &InvertOptions,
) -> Result<Matrix, CacheError>
where
    I: Inverter + ?Sized,
{
    debug!(slot = %id, rows = matrix.rows(), cols = matrix.cols(), "cache miss; inverting");
    match inverter.invert(matrix, options) {
        Ok(inverse) => {
            registry.metrics().record_computation();
            Ok(inverse)
        }
        Err(source) => {
            registry.metrics().record_failure();
            debug!(slot = %id, error = %source, "inversion failed");
            Err(CacheError::InversionFailed { slot: id, source })
        }
    }
}

/// A registry paired with the inverter and options used to fill it.
pub struct CacheSolver {
    registry: Arc<SlotRegistry>,
    inverter: Box<dyn Inverter>,
    options: InvertOptions,
}

impl CacheSolver {
    /// Uses [`GaussJordan`] with the registry's configured invert options.
    pub fn new(registry: Arc<SlotRegistry>) -> Self {
        Self::with_inverter(registry, GaussJordan)
    }

    pub fn with_inverter(registry: Arc<SlotRegistry>, inverter: impl Inverter + 'static) -> Self {
        let options = registry.config().invert;
        Self {
            registry,
            inverter: Box::new(inverter),
            options,
        }
    }

    pub fn registry(&self) -> &Arc<SlotRegistry> {
        &self.registry
    }

    pub fn create_slot(&self, initial: Option<Matrix>) -> SlotId {
        self.registry.create_slot(initial)
    }

    pub fn set_matrix(&self, id: SlotId, matrix: Matrix) -> Result<(), CacheError> {
        self.registry.set_matrix(id, matrix)
    }

    pub fn solve(&self, id: SlotId) -> Result<Matrix, CacheError> {
        cache_solve(&self.registry, id, self.inverter.as_ref(), &self.options)
    }

    pub fn solve_outcome(&self, id: SlotId) -> Result<Solved, CacheError> {
        cache_solve_outcome(&self.registry, id, self.inverter.as_ref(), &self.options)
    }

    pub fn solve_many(&self, ids: &[SlotId]) -> Vec<Result<Matrix, CacheError>> {
        cache_solve_many(&self.registry, ids, self.inverter.as_ref(), &self.options)
    }
}
