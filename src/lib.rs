//! Per-slot memoization of matrix inverses.
//!
//! A [`SlotRegistry`] owns slots that each hold an optional matrix and at
//! most one cached inverse. [`cache_solve`] returns a slot's inverse,
//! computing it through an [`Inverter`] only when nothing valid is cached.
//! Replacing a slot's matrix always drops its cached inverse.

pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod scenario;
pub mod solve;
pub mod utils;

pub use config::{CacheConfig, LockStrategy};
pub use error::{CacheError, ConfigError};
pub use invcache_matrix::{GaussJordan, InvertError, InvertOptions, Inverter, Matrix};
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use registry::{SlotId, SlotRegistry};
pub use solve::{CacheSolver, Lookup, Solved, cache_solve, cache_solve_many, cache_solve_outcome};
