//! Sample cache
//!
//! Memoises `f(x)` per graphing function so that redrawing a plot over an
//! unchanged range does not recompute any point. Keys are the exact bit
//! pattern of `x`; nothing is approximated.

use dashmap::DashMap;
use plotscript_core::{EvalError, FunctionId, GraphingFunction, SampleRange, Value};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

/// A point that could not be computed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleFailure {
    pub x: f64,
    pub error: String,
}

/// Result of sweeping a range
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Curve {
    pub range: Option<SampleRange>,
    /// `(x, y)` in ascending `x`
    pub points: Vec<(f64, f64)>,
    pub failures: Vec<SampleFailure>,
}

/// Explicit range, else the function's own, else `fallback`
pub fn resolve_range(
    explicit: Option<SampleRange>,
    function: &GraphingFunction,
    fallback: SampleRange,
) -> SampleRange {
    explicit.or(function.default_range()).unwrap_or(fallback)
}

/// Per-function memo table
pub struct SampleCache {
    function: GraphingFunction,
    points: DashMap<u64, Value>,
}

impl SampleCache {
    pub fn new(function: GraphingFunction) -> Self {
        Self {
            function,
            points: DashMap::new(),
        }
    }

    pub fn function(&self) -> &GraphingFunction {
        &self.function
    }

    /// Cached `f(x)`, computing and storing it on a miss.
    ///
    /// Failures are returned but never stored. Two threads missing on the
    /// same key both compute; the results are equal.
    pub fn get_or_compute(&self, x: f64) -> Result<Value, EvalError> {
        let key = x.to_bits();
        if let Some(value) = self.points.get(&key) {
            return Ok(value.clone());
        }

        let value = self.function.invoke(x)?;
        self.points.insert(key, value.clone());
        Ok(value)
    }

    pub fn clear(&self) {
        trace!(function = %self.function, points = self.points.len(), "sample cache cleared");
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sweep `range` (or the function's default) in parallel
    pub fn sample(&self, range: Option<SampleRange>) -> Curve {
        self.sample_range(resolve_range(range, &self.function, SampleRange::default()))
    }

    pub fn sample_range(&self, range: SampleRange) -> Curve {
        let xs: Vec<f64> = range.points().collect();
        let results: Vec<(f64, Result<f64, EvalError>)> = xs
            .into_par_iter()
            .map(|x| (x, self.get_or_compute(x).and_then(|v| scalar(&v))))
            .collect();

        let mut curve = Curve {
            range: Some(range),
            ..Curve::default()
        };
        for (x, result) in results {
            match result {
                Ok(y) => curve.points.push((x, y)),
                Err(error) => curve.failures.push(SampleFailure {
                    x,
                    error: error.to_string(),
                }),
            }
        }
        curve
    }
}

fn scalar(value: &Value) -> Result<f64, EvalError> {
    value.as_f64().ok_or(EvalError::InvalidOperand {
        op: "plot",
        operand: value.type_name(),
    })
}

/// Caches for every graphing function a host is showing.
///
/// Keyed by function identity. Each cache holds its function, so an
/// identity cannot be reused by another function while its cache exists.
#[derive(Default)]
pub struct SampleCaches {
    caches: DashMap<FunctionId, Arc<SampleCache>>,
}

impl SampleCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_for(&self, function: &GraphingFunction) -> Arc<SampleCache> {
        let cache = self
            .caches
            .entry(function.id())
            .or_insert_with(|| Arc::new(SampleCache::new(function.clone())));
        Arc::clone(&cache)
    }

    pub fn get_or_compute(&self, function: &GraphingFunction, x: f64) -> Result<Value, EvalError> {
        self.cache_for(function).get_or_compute(x)
    }

    pub fn sample(&self, function: &GraphingFunction, range: SampleRange) -> Curve {
        self.cache_for(function).sample_range(range)
    }

    /// Empty the cache of `function`, keeping the entry
    pub fn clear(&self, function: &GraphingFunction) {
        if let Some(cache) = self.caches.get(&function.id()) {
            cache.clear();
        }
    }

    /// Drop caches of functions not in `live`
    pub fn retain(&self, live: &[GraphingFunction]) {
        self.caches
            .retain(|id, _| live.iter().any(|function| function.id() == *id));
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotscript_core::{Arity, Callable, Function};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// `x * x`, counting invocations; fails for negative input
    struct Counted(Arc<AtomicUsize>);

    impl Callable for Counted {
        fn arity(&self) -> Arity {
            Arity::Exact(1)
        }

        fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            let x = args[0].as_f64().unwrap_or(0.0);
            if x < 0.0 {
                return Err(EvalError::domain("counted", "negative"));
            }
            Ok(Value::Float(x * x))
        }
    }

    fn counted() -> (GraphingFunction, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let function = Function::named("sq", Arc::new(Counted(Arc::clone(&calls))));
        (GraphingFunction::new(function, None), calls)
    }

    #[test]
    fn test_second_lookup_is_cached() {
        let (function, calls) = counted();
        let caches = SampleCaches::new();

        let first = caches.get_or_compute(&function, 3.0).unwrap();
        let second = caches.get_or_compute(&function, 3.0).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Value::Float(9.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_forces_recompute() {
        let (function, calls) = counted();
        let caches = SampleCaches::new();

        caches.get_or_compute(&function, 3.0).unwrap();
        caches.clear(&function);
        caches.get_or_compute(&function, 3.0).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_keys_are_exact() {
        let (function, calls) = counted();
        let cache = SampleCache::new(function);
        cache.get_or_compute(0.1 + 0.2).unwrap();
        cache.get_or_compute(0.3).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failures_not_cached() {
        let (function, calls) = counted();
        let cache = SampleCache::new(function);
        assert!(cache.get_or_compute(-1.0).is_err());
        assert!(cache.get_or_compute(-1.0).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sample_sorted_with_gaps() {
        let (function, _) = counted();
        let cache = SampleCache::new(function);
        let range = SampleRange::new(-1.0, 1.0, 0.5).unwrap();
        let curve = cache.sample(Some(range));

        let xs: Vec<f64> = curve.points.iter().map(|(x, _)| *x).collect();
        assert_eq!(xs, vec![0.0, 0.5, 1.0]);
        assert_eq!(curve.points[2], (1.0, 1.0));
        assert_eq!(curve.failures.len(), 2);
        assert_eq!(curve.failures[0].x, -1.0);
    }

    #[test]
    fn test_resweep_uses_cache() {
        let (function, calls) = counted();
        let cache = SampleCache::new(function);
        let range = SampleRange::new(0.0, 1.0, 0.25).unwrap();
        cache.sample(Some(range));
        cache.sample(Some(range));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_range_resolution() {
        let (function, _) = counted();
        let own = SampleRange::new(0.0, 2.0, 1.0).unwrap();
        let explicit = SampleRange::new(5.0, 6.0, 1.0).unwrap();
        let ranged = GraphingFunction::new(function.function().clone(), Some(own));

        assert_eq!(resolve_range(Some(explicit), &ranged, SampleRange::default()), explicit);
        assert_eq!(resolve_range(None, &ranged, SampleRange::default()), own);
        assert_eq!(resolve_range(None, &function, SampleRange::default()), SampleRange::default());

        let curve = SampleCache::new(function).sample(None);
        assert_eq!(curve.points.len() + curve.failures.len(), 201);
    }

    #[test]
    fn test_retain_drops_stale_caches() {
        let (a, _) = counted();
        let (b, _) = counted();
        let caches = SampleCaches::new();
        caches.get_or_compute(&a, 1.0).unwrap();
        caches.get_or_compute(&b, 1.0).unwrap();
        assert_eq!(caches.len(), 2);

        caches.retain(std::slice::from_ref(&a));
        assert_eq!(caches.len(), 1);
        assert_eq!(caches.cache_for(&a).len(), 1);
    }

    #[test]
    fn test_concurrent_lookups() {
        let (function, _) = counted();
        let cache = Arc::new(SampleCache::new(function));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    (0..100).map(|i| cache.get_or_compute(i as f64).unwrap()).count()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 100);
        }
        assert_eq!(cache.len(), 100);
    }
}
