//! Binding of a manifold and an objective into an optimization problem.
//!
//! The problem is a thin, immutable binder: it owns the manifold and the
//! objective and forwards evaluations. Caching and counting live in the
//! objective decorators, never here.

use crate::core::{
    error::SolverResult,
    manifold::Manifold,
    objective::Objective,
    types::Scalar,
};
use std::fmt::Debug;
use std::marker::PhantomData;

/// An unconstrained minimization problem `argmin f(p)` over a manifold.
///
/// Immutable during a solve; a problem may be shared between concurrent
/// solves running on separate states.
#[derive(Debug)]
pub struct Problem<T, M, O>
where
    T: Scalar,
    M: Manifold<T>,
    O: Objective<T, M>,
{
    manifold: M,
    objective: O,
    _scalar: PhantomData<fn() -> T>,
}

impl<T, M, O> Problem<T, M, O>
where
    T: Scalar,
    M: Manifold<T>,
    O: Objective<T, M>,
{
    /// Binds a manifold and an objective.
    pub fn new(manifold: M, objective: O) -> Self {
        Self {
            manifold,
            objective,
            _scalar: PhantomData,
        }
    }

    /// Returns the manifold.
    pub fn manifold(&self) -> &M {
        &self.manifold
    }

    /// Returns the objective, e.g. to read evaluation counters after a
    /// solve.
    pub fn objective(&self) -> &O {
        &self.objective
    }

    /// Consumes the problem, returning manifold and objective.
    pub fn into_parts(self) -> (M, O) {
        (self.manifold, self.objective)
    }

    /// Evaluates the cost at `point`.
    pub fn cost(&self, point: &M::Point) -> SolverResult<T> {
        self.objective.cost(&self.manifold, point)
    }

    /// Evaluates the Riemannian gradient at `point`.
    pub fn gradient(&self, point: &M::Point) -> SolverResult<M::TangentVector> {
        self.objective.riemannian_gradient(&self.manifold, point)
    }
}

/// Object-safe view of a problem.
///
/// Stopping criteria, stepsize rules, debug and record actions and the
/// solvers all see the problem through this trait, which keeps them
/// independent of the concrete objective type.
pub trait OptimizationProblem<T, M>: Debug
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Returns the manifold.
    fn manifold(&self) -> &M;

    /// Evaluates the cost at `point`.
    fn cost(&self, point: &M::Point) -> SolverResult<T>;

    /// Evaluates the Riemannian gradient at `point`.
    fn gradient(&self, point: &M::Point) -> SolverResult<M::TangentVector>;

    /// In-place variant of [`gradient`](OptimizationProblem::gradient).
    fn gradient_in_place(
        &self,
        point: &M::Point,
        result: &mut M::TangentVector,
    ) -> SolverResult<()>;

    /// Evaluates the k-th proximal map at `point` with parameter `lambda`.
    fn proximal_map(&self, lambda: T, point: &M::Point, k: usize) -> SolverResult<M::Point>;

    /// Number of proximal-map components of the objective.
    fn proximal_map_count(&self) -> usize;
}

impl<T, M, O> OptimizationProblem<T, M> for Problem<T, M, O>
where
    T: Scalar,
    M: Manifold<T>,
    O: Objective<T, M>,
{
    fn manifold(&self) -> &M {
        &self.manifold
    }

    fn cost(&self, point: &M::Point) -> SolverResult<T> {
        self.objective.cost(&self.manifold, point)
    }

    fn gradient(&self, point: &M::Point) -> SolverResult<M::TangentVector> {
        self.objective.riemannian_gradient(&self.manifold, point)
    }

    fn gradient_in_place(
        &self,
        point: &M::Point,
        result: &mut M::TangentVector,
    ) -> SolverResult<()> {
        self.objective
            .riemannian_gradient_in_place(&self.manifold, point, result)
    }

    fn proximal_map(&self, lambda: T, point: &M::Point, k: usize) -> SolverResult<M::Point> {
        self.objective.proximal_map(&self.manifold, lambda, point, k)
    }

    fn proximal_map_count(&self) -> usize {
        self.objective.proximal_map_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::objective::GradientObjective;
    use crate::core::types::DVector;
    use crate::test_utils::TestEuclideanManifold;

    #[test]
    fn test_problem_forwards_evaluations() {
        let manifold = TestEuclideanManifold::new(2);
        let objective = GradientObjective::new(
            |_m: &TestEuclideanManifold, p: &DVector<f64>| 0.5 * p.norm_squared(),
            |_m: &TestEuclideanManifold, p: &DVector<f64>| p.clone(),
        );
        let problem = Problem::new(manifold, objective);
        let point = DVector::from_vec(vec![3.0, 4.0]);

        assert_eq!(problem.cost(&point).unwrap(), 12.5);
        assert_eq!(problem.gradient(&point).unwrap(), point);

        // Same answers through the object-safe view.
        let view: &dyn OptimizationProblem<f64, TestEuclideanManifold> = &problem;
        assert_eq!(view.cost(&point).unwrap(), 12.5);
        let mut buffer = DVector::zeros(2);
        view.gradient_in_place(&point, &mut buffer).unwrap();
        assert_eq!(buffer, point);
        assert_eq!(view.proximal_map_count(), 0);
    }
}
