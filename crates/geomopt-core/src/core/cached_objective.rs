//! Caching decorators for objectives.
//!
//! Optimization algorithms frequently evaluate cost and gradient at the same
//! point (stopping criteria, line searches, record actions). The wrappers in
//! this module memoize those evaluations so the wrapped objective only sees
//! cache misses. Compose with [`CountingObjective`](crate::core::objective::CountingObjective)
//! inside the cache to count misses, outside to count every call.

use crate::core::{
    error::SolverResult,
    manifold::Manifold,
    objective::Objective,
    types::{DVector, Scalar},
};
use lru::LruCache;
use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

/// Content-based key for cache lookups.
///
/// Two points with the same scalar content must produce the same key. The
/// implementations hash the bit patterns of the components, so the key is
/// exact (no tolerance) and cheap to compute.
pub trait ContentKey {
    /// Returns the content-based key of this value.
    fn content_key(&self) -> u64;
}

impl<T: Scalar> ContentKey for DVector<T> {
    fn content_key(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.len().hash(&mut hasher);
        for component in self.iter() {
            component.to_f64().unwrap().to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl<A: ContentKey, B: ContentKey> ContentKey for (A, B) {
    fn content_key(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.0.content_key().hash(&mut hasher);
        self.1.content_key().hash(&mut hasher);
        hasher.finish()
    }
}

/// Last-entry cache storage.
#[derive(Debug)]
struct SimpleCacheStorage<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    point: Option<M::Point>,
    cost: Option<T>,
    gradient: Option<M::TangentVector>,
    hits: usize,
    misses: usize,
}

impl<T, M> Default for SimpleCacheStorage<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn default() -> Self {
        Self {
            point: None,
            cost: None,
            gradient: None,
            hits: 0,
            misses: 0,
        }
    }
}

/// Caching decorator that remembers the most recent evaluation point only.
///
/// Points are compared with `PartialEq`; any change of iterate invalidates
/// both the cached cost and the cached gradient.
#[derive(Debug)]
pub struct SimpleCacheObjective<T, M, O>
where
    T: Scalar,
    M: Manifold<T>,
{
    inner: O,
    cache: RefCell<SimpleCacheStorage<T, M>>,
}

impl<T, M, O> SimpleCacheObjective<T, M, O>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Wraps an objective with a last-entry cache.
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            cache: RefCell::new(SimpleCacheStorage::default()),
        }
    }

    /// Returns the wrapped objective.
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Returns cache statistics as (hits, misses).
    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.borrow();
        (cache.hits, cache.misses)
    }

    /// Clears the cached entry without touching the statistics.
    pub fn reset_cache(&self) {
        let mut cache = self.cache.borrow_mut();
        cache.point = None;
        cache.cost = None;
        cache.gradient = None;
    }

    /// Invalidates the cached entry if `point` differs from the cached one.
    fn check_and_invalidate(&self, point: &M::Point) {
        let mut cache = self.cache.borrow_mut();
        let point_changed = cache.point.as_ref() != Some(point);
        if point_changed {
            cache.point = Some(point.clone());
            cache.cost = None;
            cache.gradient = None;
        }
    }
}

impl<T, M, O> Objective<T, M> for SimpleCacheObjective<T, M, O>
where
    T: Scalar,
    M: Manifold<T>,
    O: Objective<T, M>,
{
    fn cost(&self, manifold: &M, point: &M::Point) -> SolverResult<T> {
        self.check_and_invalidate(point);
        let cached = self.cache.borrow().cost;
        if let Some(cost) = cached {
            self.cache.borrow_mut().hits += 1;
            return Ok(cost);
        }
        let cost = self.inner.cost(manifold, point)?;
        let mut cache = self.cache.borrow_mut();
        cache.cost = Some(cost);
        cache.misses += 1;
        Ok(cost)
    }

    fn riemannian_gradient(&self, manifold: &M, point: &M::Point) -> SolverResult<M::TangentVector> {
        self.check_and_invalidate(point);
        let cached = self.cache.borrow().gradient.clone();
        if let Some(gradient) = cached {
            self.cache.borrow_mut().hits += 1;
            return Ok(gradient);
        }
        let gradient = self.inner.riemannian_gradient(manifold, point)?;
        let mut cache = self.cache.borrow_mut();
        cache.gradient = Some(gradient.clone());
        cache.misses += 1;
        Ok(gradient)
    }

    fn proximal_map(
        &self,
        manifold: &M,
        lambda: T,
        point: &M::Point,
        k: usize,
    ) -> SolverResult<M::Point> {
        self.inner.proximal_map(manifold, lambda, point, k)
    }

    fn proximal_map_count(&self) -> usize {
        self.inner.proximal_map_count()
    }
}

/// One cached slot of the LRU cache.
#[derive(Debug)]
struct LruSlot<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    cost: Option<T>,
    gradient: Option<M::TangentVector>,
}

/// Hit/miss counters of the LRU cache.
#[derive(Debug, Clone, Copy, Default)]
struct LruStats {
    hits: usize,
    misses: usize,
}

/// Caching decorator keeping up to `capacity` entries, keyed by the
/// content-based point key and evicted in least-recently-used order.
pub struct LruCacheObjective<T, M, O>
where
    T: Scalar,
    M: Manifold<T>,
{
    inner: O,
    cache: RefCell<LruCache<u64, LruSlot<T, M>>>,
    stats: RefCell<LruStats>,
}

impl<T, M, O> LruCacheObjective<T, M, O>
where
    T: Scalar,
    M: Manifold<T>,
    M::Point: ContentKey,
{
    /// Wraps an objective with an LRU cache of the given capacity.
    ///
    /// A zero capacity is clamped to one slot.
    pub fn new(inner: O, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: RefCell::new(LruCache::new(capacity)),
            stats: RefCell::new(LruStats::default()),
        }
    }

    /// Returns the wrapped objective.
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Returns cache statistics as (hits, misses).
    pub fn cache_stats(&self) -> (usize, usize) {
        let stats = self.stats.borrow();
        (stats.hits, stats.misses)
    }

    /// Number of points currently cached.
    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    /// Number of entries the cache can hold.
    pub fn capacity(&self) -> usize {
        self.cache.borrow().cap().get()
    }
}

impl<T, M, O> Debug for LruCacheObjective<T, M, O>
where
    T: Scalar,
    M: Manifold<T>,
    M::Point: ContentKey,
    O: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCacheObjective")
            .field("inner", &self.inner)
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("stats", &self.stats.borrow())
            .finish()
    }
}

impl<T, M, O> Objective<T, M> for LruCacheObjective<T, M, O>
where
    T: Scalar,
    M: Manifold<T>,
    M::Point: ContentKey,
    O: Objective<T, M>,
{
    fn cost(&self, manifold: &M, point: &M::Point) -> SolverResult<T> {
        let key = point.content_key();
        // A lookup bumps the entry's recency.
        let cached = self.cache.borrow_mut().get(&key).and_then(|slot| slot.cost);
        if let Some(cost) = cached {
            self.stats.borrow_mut().hits += 1;
            return Ok(cost);
        }
        let cost = self.inner.cost(manifold, point)?;
        self.stats.borrow_mut().misses += 1;
        let mut cache = self.cache.borrow_mut();
        match cache.get_mut(&key) {
            Some(slot) => slot.cost = Some(cost),
            None => {
                cache.put(
                    key,
                    LruSlot {
                        cost: Some(cost),
                        gradient: None,
                    },
                );
            }
        }
        Ok(cost)
    }

    fn riemannian_gradient(&self, manifold: &M, point: &M::Point) -> SolverResult<M::TangentVector> {
        let key = point.content_key();
        let cached = self
            .cache
            .borrow_mut()
            .get(&key)
            .and_then(|slot| slot.gradient.clone());
        if let Some(gradient) = cached {
            self.stats.borrow_mut().hits += 1;
            return Ok(gradient);
        }
        let gradient = self.inner.riemannian_gradient(manifold, point)?;
        self.stats.borrow_mut().misses += 1;
        let mut cache = self.cache.borrow_mut();
        match cache.get_mut(&key) {
            Some(slot) => slot.gradient = Some(gradient.clone()),
            None => {
                cache.put(
                    key,
                    LruSlot {
                        cost: None,
                        gradient: Some(gradient.clone()),
                    },
                );
            }
        }
        Ok(gradient)
    }

    fn proximal_map(
        &self,
        manifold: &M,
        lambda: T,
        point: &M::Point,
        k: usize,
    ) -> SolverResult<M::Point> {
        self.inner.proximal_map(manifold, lambda, point, k)
    }

    fn proximal_map_count(&self) -> usize {
        self.inner.proximal_map_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::objective::{CountingObjective, GradientObjective};
    use crate::test_utils::TestEuclideanManifold;

    fn quadratic() -> GradientObjective<
        impl Fn(&TestEuclideanManifold, &DVector<f64>) -> f64,
        impl Fn(&TestEuclideanManifold, &DVector<f64>) -> DVector<f64>,
    > {
        GradientObjective::new(
            |_m: &TestEuclideanManifold, p: &DVector<f64>| 0.5 * p.norm_squared(),
            |_m: &TestEuclideanManifold, p: &DVector<f64>| p.clone(),
        )
    }

    #[test]
    fn test_simple_cache_hits_on_repeated_point() {
        let manifold = TestEuclideanManifold::new(2);
        let cached = SimpleCacheObjective::new(quadratic());
        let point = DVector::from_vec(vec![1.0, 2.0]);

        let first = cached.cost(&manifold, &point).unwrap();
        for _ in 0..4 {
            assert_eq!(cached.cost(&manifold, &point).unwrap(), first);
        }
        assert_eq!(cached.cache_stats(), (4, 1));
    }

    #[test]
    fn test_simple_cache_invalidates_on_new_point() {
        let manifold = TestEuclideanManifold::new(2);
        let cached = SimpleCacheObjective::new(quadratic());
        let a = DVector::from_vec(vec![1.0, 0.0]);
        let b = DVector::from_vec(vec![0.0, 1.0]);

        cached.cost(&manifold, &a).unwrap();
        cached.cost(&manifold, &b).unwrap();
        cached.cost(&manifold, &a).unwrap();

        // Each switch of the point is a miss; only the last entry is kept.
        assert_eq!(cached.cache_stats(), (0, 3));
    }

    #[test]
    fn test_count_inside_cache_measures_misses() {
        let manifold = TestEuclideanManifold::new(2);
        let cached = SimpleCacheObjective::new(CountingObjective::new(quadratic()));
        let point = DVector::from_vec(vec![1.0, 2.0]);

        for _ in 0..5 {
            cached.cost(&manifold, &point).unwrap();
        }
        assert_eq!(cached.inner().counts().0, 1);
    }

    #[test]
    fn test_count_outside_cache_measures_calls() {
        let manifold = TestEuclideanManifold::new(2);
        let counted = CountingObjective::new(SimpleCacheObjective::new(quadratic()));
        let point = DVector::from_vec(vec![1.0, 2.0]);

        for _ in 0..5 {
            counted.cost(&manifold, &point).unwrap();
        }
        assert_eq!(counted.counts().0, 5);
    }

    #[test]
    fn test_lru_cache_eviction() {
        let manifold = TestEuclideanManifold::new(1);
        let cached = LruCacheObjective::new(quadratic(), 2);
        let a = DVector::from_vec(vec![1.0]);
        let b = DVector::from_vec(vec![2.0]);
        let c = DVector::from_vec(vec![3.0]);

        cached.cost(&manifold, &a).unwrap();
        cached.cost(&manifold, &b).unwrap();
        // `a` is still cached.
        cached.cost(&manifold, &a).unwrap();
        assert_eq!(cached.cache_stats(), (1, 2));

        // Inserting `c` evicts `b`, the least recently used entry.
        cached.cost(&manifold, &c).unwrap();
        cached.cost(&manifold, &b).unwrap();
        assert_eq!(cached.cache_stats(), (1, 4));
        assert_eq!(cached.len(), 2);
    }

    #[test]
    fn test_lru_caches_gradient_separately() {
        let manifold = TestEuclideanManifold::new(2);
        let cached = LruCacheObjective::new(CountingObjective::new(quadratic()), 4);
        let point = DVector::from_vec(vec![1.0, 2.0]);

        cached.cost(&manifold, &point).unwrap();
        cached.riemannian_gradient(&manifold, &point).unwrap();
        cached.riemannian_gradient(&manifold, &point).unwrap();

        // One cost miss, one gradient miss, one gradient hit.
        assert_eq!(cached.inner().counts(), (1, 1, 0));
    }

    #[test]
    fn test_content_key_is_content_based() {
        let a = DVector::from_vec(vec![1.0_f64, 2.0]);
        let b = DVector::from_vec(vec![1.0_f64, 2.0]);
        let c = DVector::from_vec(vec![1.0_f64, 2.0 + 1e-15]);

        assert_eq!(a.content_key(), b.content_key());
        assert_ne!(a.content_key(), c.content_key());
    }
}
