use std::sync::atomic::{AtomicUsize, Ordering};

use invcache::{
    CacheConfig, CacheError, InvertError, InvertOptions, Inverter, LockStrategy, Lookup, Matrix,
    SlotRegistry, cache_solve, cache_solve_outcome,
};

/// Gauss-Jordan with a call counter.
#[derive(Default)]
struct CountingInverter {
    calls: AtomicUsize,
}

impl CountingInverter {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Inverter for CountingInverter {
    fn invert(&self, matrix: &Matrix, options: &InvertOptions) -> Result<Matrix, InvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        invcache::GaussJordan.invert(matrix, options)
    }
}

fn m(rows: Vec<Vec<f64>>) -> Matrix {
    Matrix::from_rows(rows).expect("well-formed matrix")
}

fn m1() -> Matrix {
    m(vec![vec![4.0, 7.0], vec![2.0, 6.0]])
}

fn m2() -> Matrix {
    m(vec![vec![2.0, 0.0], vec![0.0, 8.0]])
}

fn registries() -> Vec<SlotRegistry> {
    [LockStrategy::Optimistic, LockStrategy::UnderLock]
        .into_iter()
        .map(|lock_strategy| {
            SlotRegistry::with_config(CacheConfig {
                lock_strategy,
                ..CacheConfig::default()
            })
        })
        .collect()
}

#[test]
fn repeated_solves_hit_the_cache() {
    for registry in registries() {
        let inverter = CountingInverter::default();
        let options = InvertOptions::default();
        let id = registry.create_slot(Some(m1()));

        let first = cache_solve(&registry, id, &inverter, &options).unwrap();
        for _ in 0..10 {
            let again = cache_solve(&registry, id, &inverter, &options).unwrap();
            assert_eq!(again.as_slice(), first.as_slice());
        }
        assert_eq!(inverter.calls(), 1);

        let snap = registry.metrics().snapshot();
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.hits, 10);
        assert_eq!(snap.computations, 1);
    }
}

#[test]
fn hit_returns_bit_identical_stored_value() {
    let registry = SlotRegistry::new();
    let id = registry.create_slot(Some(m1()));
    let options = InvertOptions::default();

    let stored = cache_solve(&registry, id, &invcache::GaussJordan, &options).unwrap();
    let hit = cache_solve_outcome(&registry, id, &invcache::GaussJordan, &options).unwrap();

    assert_eq!(hit.lookup, Lookup::Hit);
    let stored_bits: Vec<u64> = stored.as_slice().iter().map(|v| v.to_bits()).collect();
    let hit_bits: Vec<u64> = hit.inverse.as_slice().iter().map(|v| v.to_bits()).collect();
    assert_eq!(stored_bits, hit_bits);
}

#[test]
fn set_matrix_invalidates_even_for_equal_value() {
    for registry in registries() {
        let inverter = CountingInverter::default();
        let options = InvertOptions::default();
        let id = registry.create_slot(Some(m1()));

        cache_solve(&registry, id, &inverter, &options).unwrap();
        registry.set_matrix(id, m1()).unwrap();
        assert_eq!(registry.get_inverse(id).unwrap(), None);

        cache_solve(&registry, id, &inverter, &options).unwrap();
        assert_eq!(inverter.calls(), 2);
    }
}

#[test]
fn slots_do_not_affect_each_other() {
    let registry = SlotRegistry::new();
    let inverter = CountingInverter::default();
    let options = InvertOptions::default();

    let b = registry.create_slot(Some(m2()));
    let b_inverse = cache_solve(&registry, b, &inverter, &options).unwrap();

    let a = registry.create_slot(Some(m1()));
    cache_solve(&registry, a, &inverter, &options).unwrap();
    registry.set_matrix(a, m2()).unwrap();
    cache_solve(&registry, a, &inverter, &options).unwrap();

    assert_eq!(registry.get_matrix(b).unwrap(), Some(m2()));
    assert_eq!(registry.get_inverse(b).unwrap(), Some(b_inverse));
}

#[test]
fn fresh_slot_computes_once_across_two_solves() {
    for registry in registries() {
        let inverter = CountingInverter::default();
        let options = InvertOptions::default();
        let id = registry.create_slot(Some(m2()));

        let first = cache_solve_outcome(&registry, id, &inverter, &options).unwrap();
        let second = cache_solve_outcome(&registry, id, &inverter, &options).unwrap();

        assert_eq!(first.lookup, Lookup::Computed);
        assert_eq!(second.lookup, Lookup::Hit);
        assert_eq!(inverter.calls(), 1);
    }
}

#[test]
fn solving_an_empty_slot_fails_without_inverting() {
    for registry in registries() {
        let inverter = CountingInverter::default();
        let id = registry.create_slot(None);

        let err = cache_solve(&registry, id, &inverter, &InvertOptions::default()).unwrap_err();

        assert_eq!(err, CacheError::NoMatrixSet(id));
        assert!(err.is_recoverable());
        assert_eq!(inverter.calls(), 0);
        assert_eq!(registry.get_inverse(id).unwrap(), None);
    }
}

#[test]
fn empty_slot_can_be_filled_later() {
    let registry = SlotRegistry::new();
    let options = InvertOptions::default();
    let id = registry.create_slot(None);

    assert!(cache_solve(&registry, id, &invcache::GaussJordan, &options).is_err());
    registry.set_matrix(id, m2()).unwrap();

    let inverse = cache_solve(&registry, id, &invcache::GaussJordan, &options).unwrap();
    assert!(inverse.approx_eq(&m(vec![vec![0.5, 0.0], vec![0.0, 0.125]]), 1e-12));
}

#[test]
fn failed_inversion_is_not_cached() {
    for registry in registries() {
        let inverter = CountingInverter::default();
        let options = InvertOptions::default();
        let singular = m(vec![vec![1.0, 2.0], vec![2.0, 4.0]]);
        let id = registry.create_slot(Some(singular));

        let err = cache_solve(&registry, id, &inverter, &options).unwrap_err();
        assert!(matches!(
            err,
            CacheError::InversionFailed {
                source: InvertError::Singular { .. },
                ..
            }
        ));
        assert_eq!(registry.get_inverse(id).unwrap(), None);

        // Still empty, so a retry inverts again rather than hitting.
        assert!(cache_solve(&registry, id, &inverter, &options).is_err());
        assert_eq!(inverter.calls(), 2);

        registry.set_matrix(id, m2()).unwrap();
        let fixed = cache_solve(&registry, id, &inverter, &options).unwrap();
        assert_eq!(registry.get_inverse(id).unwrap(), Some(fixed.clone()));
        assert_eq!(inverter.calls(), 3);

        let snap = registry.metrics().snapshot();
        assert_eq!(snap.failures, 2);
        assert_eq!(snap.computations, 1);
    }
}

#[test]
fn inversion_error_is_passed_through_unchanged() {
    let registry = SlotRegistry::new();
    let id = registry.create_slot(Some(m1()));
    let failing = |_: &Matrix, _: &InvertOptions| -> Result<Matrix, InvertError> {
        Err(InvertError::NonFinite)
    };

    let err = cache_solve(&registry, id, &failing, &InvertOptions::default()).unwrap_err();
    assert_eq!(
        err,
        CacheError::InversionFailed {
            slot: id,
            source: InvertError::NonFinite
        }
    );
}

#[test]
fn invert_set_invert_scenario() {
    for registry in registries() {
        let inverter = CountingInverter::default();
        let options = InvertOptions::default();
        let i1 = invcache::GaussJordan.invert(&m1(), &options).unwrap();
        let i2 = invcache::GaussJordan.invert(&m2(), &options).unwrap();

        let id = registry.create_slot(Some(m1()));

        assert_eq!(cache_solve(&registry, id, &inverter, &options).unwrap(), i1);
        assert_eq!(inverter.calls(), 1);

        assert_eq!(cache_solve(&registry, id, &inverter, &options).unwrap(), i1);
        assert_eq!(inverter.calls(), 1);

        registry.set_matrix(id, m2()).unwrap();
        assert_eq!(cache_solve(&registry, id, &inverter, &options).unwrap(), i2);
        assert_eq!(inverter.calls(), 2);
    }
}

#[test]
fn unknown_slot_is_rejected_by_solve() {
    let registry = SlotRegistry::new();
    let inverter = CountingInverter::default();
    let bogus = invcache::SlotId::new(7).unwrap();

    let err = cache_solve(&registry, bogus, &inverter, &InvertOptions::default()).unwrap_err();
    assert_eq!(err, CacheError::InvalidSlot(bogus));
    assert!(!err.is_recoverable());
    assert_eq!(inverter.calls(), 0);
}

#[test]
fn options_reach_the_inverter() {
    let registry = SlotRegistry::new();
    let id = registry.create_slot(Some(m(vec![vec![1e-6]])));
    let strict = InvertOptions { tolerance: 1e-3 };

    assert!(cache_solve(&registry, id, &invcache::GaussJordan, &strict).is_err());
    assert!(cache_solve(&registry, id, &invcache::GaussJordan, &InvertOptions::default()).is_ok());
}
