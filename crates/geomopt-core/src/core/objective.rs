//! Objective interface for the solver engine.
//!
//! An objective bundles the callables a solver evaluates: the cost, the
//! Riemannian gradient and, for nonsmooth solvers, proximal maps. Objectives
//! can be wrapped by decorators (counting, caching) that intercept the
//! evaluation methods; see [`CountingObjective`] and the caching wrappers in
//! [`crate::core::cached_objective`].

use crate::core::{
    error::{SolverError, SolverResult},
    manifold::Manifold,
    types::Scalar,
};
use std::cell::RefCell;
use std::fmt::{self, Debug};

/// Trait for objectives evaluated on a Riemannian manifold.
///
/// The gradient methods return the *Riemannian* gradient, a tangent vector at
/// the query point. Converting a Euclidean gradient is the caller's concern
/// (typically through
/// [`Manifold::euclidean_to_riemannian_gradient`]).
pub trait Objective<T, M>: Debug
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Evaluates the cost f(p).
    fn cost(&self, manifold: &M, point: &M::Point) -> SolverResult<T>;

    /// Evaluates the Riemannian gradient grad f(p), a tangent vector at
    /// `point`.
    fn riemannian_gradient(&self, manifold: &M, point: &M::Point) -> SolverResult<M::TangentVector>;

    /// In-place variant of [`riemannian_gradient`](Objective::riemannian_gradient).
    fn riemannian_gradient_in_place(
        &self,
        manifold: &M,
        point: &M::Point,
        result: &mut M::TangentVector,
    ) -> SolverResult<()> {
        *result = self.riemannian_gradient(manifold, point)?;
        Ok(())
    }

    /// Evaluates cost and gradient together.
    ///
    /// Objectives whose cost and gradient share intermediate computations
    /// override this.
    fn cost_and_gradient(
        &self,
        manifold: &M,
        point: &M::Point,
    ) -> SolverResult<(T, M::TangentVector)> {
        let cost = self.cost(manifold, point)?;
        let gradient = self.riemannian_gradient(manifold, point)?;
        Ok((cost, gradient))
    }

    /// Evaluates the proximal map prox_{λ f_k}(p) of the k-th objective
    /// component.
    ///
    /// Smooth objectives do not carry proximal maps; the default returns
    /// [`SolverError::UnsupportedOperation`].
    fn proximal_map(
        &self,
        _manifold: &M,
        _lambda: T,
        _point: &M::Point,
        k: usize,
    ) -> SolverResult<M::Point> {
        Err(SolverError::unsupported_operation(format!(
            "proximal map {k} on an objective without proximal maps"
        )))
    }

    /// Number of proximal-map components the objective carries.
    fn proximal_map_count(&self) -> usize {
        0
    }
}

/// Objective built from a cost closure and a Riemannian-gradient closure.
///
/// This is the entry point for callers who have plain functions: the closures
/// receive the manifold and the query point and return the cost value and
/// the Riemannian gradient respectively.
pub struct GradientObjective<F, G> {
    cost_fn: F,
    gradient_fn: G,
}

impl<F, G> GradientObjective<F, G> {
    /// Creates a new objective from a cost and a gradient closure.
    pub fn new(cost_fn: F, gradient_fn: G) -> Self {
        Self {
            cost_fn,
            gradient_fn,
        }
    }
}

impl<F, G> Debug for GradientObjective<F, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GradientObjective")
    }
}

impl<T, M, F, G> Objective<T, M> for GradientObjective<F, G>
where
    T: Scalar,
    M: Manifold<T>,
    F: Fn(&M, &M::Point) -> T,
    G: Fn(&M, &M::Point) -> M::TangentVector,
{
    fn cost(&self, manifold: &M, point: &M::Point) -> SolverResult<T> {
        Ok((self.cost_fn)(manifold, point))
    }

    fn riemannian_gradient(&self, manifold: &M, point: &M::Point) -> SolverResult<M::TangentVector> {
        Ok((self.gradient_fn)(manifold, point))
    }
}

/// Type of the boxed proximal-map closures held by [`ProximalObjective`].
pub type ProximalMapFn<T, M> = Box<
    dyn Fn(&M, T, &<M as Manifold<T>>::Point) -> <M as Manifold<T>>::Point + Send + Sync,
>;

/// Objective for nonsmooth solvers: a cost closure plus a family of
/// proximal maps, one per objective component.
pub struct ProximalObjective<T, M, F>
where
    T: Scalar,
    M: Manifold<T>,
{
    cost_fn: F,
    proximal_maps: Vec<ProximalMapFn<T, M>>,
}

impl<T, M, F> ProximalObjective<T, M, F>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Creates a new proximal objective.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::UnsupportedOperation`] when no proximal map is
    /// provided, since every solver consuming this objective needs at least
    /// one.
    pub fn new(cost_fn: F, proximal_maps: Vec<ProximalMapFn<T, M>>) -> SolverResult<Self> {
        if proximal_maps.is_empty() {
            return Err(SolverError::unsupported_operation(
                "proximal objective without proximal maps",
            ));
        }
        Ok(Self {
            cost_fn,
            proximal_maps,
        })
    }
}

impl<T, M, F> Debug for ProximalObjective<T, M, F>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProximalObjective({} components)", self.proximal_maps.len())
    }
}

impl<T, M, F> Objective<T, M> for ProximalObjective<T, M, F>
where
    T: Scalar,
    M: Manifold<T>,
    F: Fn(&M, &M::Point) -> T,
{
    fn cost(&self, manifold: &M, point: &M::Point) -> SolverResult<T> {
        Ok((self.cost_fn)(manifold, point))
    }

    fn riemannian_gradient(&self, _manifold: &M, _point: &M::Point) -> SolverResult<M::TangentVector> {
        Err(SolverError::unsupported_operation(
            "gradient of a nonsmooth proximal objective",
        ))
    }

    fn proximal_map(
        &self,
        manifold: &M,
        lambda: T,
        point: &M::Point,
        k: usize,
    ) -> SolverResult<M::Point> {
        let prox = self.proximal_maps.get(k).ok_or_else(|| {
            SolverError::unsupported_operation(format!(
                "proximal map {k} of an objective with {} components",
                self.proximal_maps.len()
            ))
        })?;
        Ok(prox(manifold, lambda, point))
    }

    fn proximal_map_count(&self) -> usize {
        self.proximal_maps.len()
    }
}

/// Counting decorator: increments per-operation counters on each call and
/// forwards to the wrapped objective.
///
/// When composed with a caching wrapper, order matters: counting innermost
/// measures cache misses, counting outermost measures every call.
#[derive(Debug)]
pub struct CountingObjective<O> {
    inner: O,
    cost_count: RefCell<usize>,
    gradient_count: RefCell<usize>,
    proximal_count: RefCell<usize>,
}

impl<O> CountingObjective<O> {
    /// Wraps an objective with evaluation counters.
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            cost_count: RefCell::new(0),
            gradient_count: RefCell::new(0),
            proximal_count: RefCell::new(0),
        }
    }

    /// Returns the wrapped objective.
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Returns the evaluation counts as (cost, gradient, proximal).
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            *self.cost_count.borrow(),
            *self.gradient_count.borrow(),
            *self.proximal_count.borrow(),
        )
    }

    /// Resets all counters to zero.
    pub fn reset_counts(&self) {
        *self.cost_count.borrow_mut() = 0;
        *self.gradient_count.borrow_mut() = 0;
        *self.proximal_count.borrow_mut() = 0;
    }
}

impl<T, M, O> Objective<T, M> for CountingObjective<O>
where
    T: Scalar,
    M: Manifold<T>,
    O: Objective<T, M>,
{
    fn cost(&self, manifold: &M, point: &M::Point) -> SolverResult<T> {
        *self.cost_count.borrow_mut() += 1;
        self.inner.cost(manifold, point)
    }

    fn riemannian_gradient(&self, manifold: &M, point: &M::Point) -> SolverResult<M::TangentVector> {
        *self.gradient_count.borrow_mut() += 1;
        self.inner.riemannian_gradient(manifold, point)
    }

    fn cost_and_gradient(
        &self,
        manifold: &M,
        point: &M::Point,
    ) -> SolverResult<(T, M::TangentVector)> {
        *self.cost_count.borrow_mut() += 1;
        *self.gradient_count.borrow_mut() += 1;
        self.inner.cost_and_gradient(manifold, point)
    }

    fn proximal_map(
        &self,
        manifold: &M,
        lambda: T,
        point: &M::Point,
        k: usize,
    ) -> SolverResult<M::Point> {
        *self.proximal_count.borrow_mut() += 1;
        self.inner.proximal_map(manifold, lambda, point, k)
    }

    fn proximal_map_count(&self) -> usize {
        self.inner.proximal_map_count()
    }
}
