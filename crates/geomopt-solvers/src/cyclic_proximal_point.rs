//! Cyclic proximal point for nonsmooth objectives.
//!
//! For an objective split into components f = Σ f_k with known proximal
//! maps, each iteration sweeps the components in cyclic order:
//!
//! ```text
//! p ← prox_{λ_i f_k}(p)   for k = 0, …, K-1
//! ```
//!
//! with a diminishing parameter λ_i = λ₀ / i. The state realizes the same
//! solver contract as gradient descent, so the driver and all decorators
//! apply unchanged.

use geomopt_core::core::{
    error::{SolverError, SolverResult},
    manifold::Manifold,
    problem::OptimizationProblem,
    types::Scalar,
};
use geomopt_core::optimization::{
    solver::{Solver, SolverState},
    stopping_criterion::{
        StopAfterIteration, StopWhenAny, StopWhenChangeLess, StoppingCriterion,
    },
};
use num_traits::Float;

/// State of the cyclic proximal point solver.
#[derive(Debug)]
pub struct CyclicProximalPointState<T, M>
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    iterate: M::Point,
    gradient: M::TangentVector,
    stopping_criterion: Option<Box<dyn StoppingCriterion<T, M>>>,
    initial_lambda: T,
    last_lambda: T,
}

impl<T, M> CyclicProximalPointState<T, M>
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    /// Creates a state at `initial_point` with λ₀ = 1 and the default
    /// stopping criterion (5000 iterations or a tiny iterate change).
    pub fn new(manifold: &M, initial_point: M::Point) -> Self {
        let gradient = manifold.zero_tangent(&initial_point);
        let stop: Box<dyn StoppingCriterion<T, M>> = StopWhenAny::new(vec![
            StopAfterIteration::new(5000).boxed(),
            StopWhenChangeLess::new(<T as Scalar>::from_f64(1e-12)).boxed(),
        ])
        .boxed();
        Self {
            iterate: initial_point,
            gradient,
            stopping_criterion: Some(stop),
            initial_lambda: T::one(),
            last_lambda: <T as Float>::infinity(),
        }
    }

    /// Sets the initial proximal parameter λ₀.
    ///
    /// # Errors
    ///
    /// Returns an error when `lambda` is not positive.
    pub fn with_initial_lambda(mut self, lambda: T) -> SolverResult<Self> {
        if lambda <= T::zero() {
            return Err(SolverError::invalid_configuration(
                "initial lambda must be positive",
                "lambda",
                format!("{}", lambda),
            ));
        }
        self.initial_lambda = lambda;
        Ok(self)
    }

    /// Replaces the stopping criterion.
    pub fn with_stopping_criterion(mut self, criterion: Box<dyn StoppingCriterion<T, M>>) -> Self {
        self.stopping_criterion = Some(criterion);
        self
    }

    /// The proximal parameter of the most recent sweep.
    pub fn last_lambda(&self) -> T {
        self.last_lambda
    }
}

impl<T, M> SolverState<T, M> for CyclicProximalPointState<T, M>
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    fn iterate(&self) -> &M::Point {
        &self.iterate
    }

    fn set_iterate(&mut self, point: M::Point) {
        self.iterate = point;
    }

    fn gradient(&self) -> &M::TangentVector {
        &self.gradient
    }

    fn set_gradient(&mut self, gradient: M::TangentVector) {
        self.gradient = gradient;
    }

    fn scalar_field(&self, name: &str) -> Option<T> {
        match name {
            "lambda" => Some(self.last_lambda),
            _ => None,
        }
    }

    fn stopping_criterion(&self) -> Option<&dyn StoppingCriterion<T, M>> {
        self.stopping_criterion.as_deref()
    }
}

impl<T, M> Solver<T, M> for CyclicProximalPointState<T, M>
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    fn initialize(&mut self, problem: &dyn OptimizationProblem<T, M>) -> SolverResult<()> {
        // The solver is unusable without proximal maps; fail the run up
        // front instead of erroring on the first sweep.
        if problem.proximal_map_count() == 0 {
            return Err(SolverError::unsupported_operation(
                "cyclic proximal point on an objective without proximal maps",
            ));
        }
        self.last_lambda = <T as Float>::infinity();
        Ok(())
    }

    fn step(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        iteration: usize,
    ) -> SolverResult<()> {
        let lambda = self.initial_lambda / <T as Scalar>::from_usize(iteration);
        for k in 0..problem.proximal_map_count() {
            self.iterate = problem.proximal_map(lambda, &self.iterate, k)?;
        }
        self.last_lambda = lambda;
        tracing::debug!(iteration, lambda = lambda.to_f64(), "cyclic proximal sweep");
        Ok(())
    }

    fn check_stop(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        let Some(mut criterion) = self.stopping_criterion.take() else {
            return Ok(false);
        };
        let stopped = criterion.check(problem, &*self, iteration);
        self.stopping_criterion = Some(criterion);
        stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geomopt_core::core::objective::{GradientObjective, ProximalObjective, ProximalMapFn};
    use geomopt_core::core::problem::Problem;
    use geomopt_core::core::types::DVector;
    use geomopt_core::optimization::solver::solve;
    use geomopt_core::test_utils::TestEuclideanManifold;

    type M = TestEuclideanManifold;

    /// prox_{λ f_k} for f_k(x) = ||x - a_k||^2 / 2 is (x + λ a_k)/(1 + λ).
    fn shifted_quadratic_prox(anchor: f64) -> ProximalMapFn<f64, M> {
        Box::new(move |_m: &M, lambda: f64, p: &DVector<f64>| {
            (p + DVector::from_vec(vec![anchor]) * lambda) / (1.0 + lambda)
        })
    }

    #[test]
    fn test_converges_to_the_mean_of_the_anchors() {
        let manifold = TestEuclideanManifold::new(1);
        let anchors = [1.0, 2.0, 3.0];
        let objective = ProximalObjective::new(
            move |_m: &M, p: &DVector<f64>| {
                anchors.iter().map(|a| 0.5 * (p[0] - a).powi(2)).sum::<f64>()
            },
            anchors.iter().map(|a| shifted_quadratic_prox(*a)).collect(),
        )
        .unwrap();
        let problem = Problem::new(manifold, objective);

        let mut state = CyclicProximalPointState::new(
            problem.manifold(),
            DVector::from_vec(vec![10.0]),
        );
        solve(&problem, &mut state).unwrap();

        assert!((state.iterate()[0] - 2.0).abs() < 1e-2);
        assert!(state.last_lambda() < 1.0);
        assert!(!state.stop_reason().is_empty());
    }

    #[test]
    fn test_requires_proximal_maps() {
        let manifold = TestEuclideanManifold::new(1);
        let objective = GradientObjective::new(
            |_m: &M, p: &DVector<f64>| 0.5 * p.norm_squared(),
            |_m: &M, p: &DVector<f64>| p.clone(),
        );
        let problem = Problem::new(manifold, objective);

        let mut state = CyclicProximalPointState::new(
            problem.manifold(),
            DVector::from_vec(vec![1.0]),
        );
        let err = solve(&problem, &mut state).unwrap_err();
        assert!(matches!(err, SolverError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_lambda_is_exposed_as_a_scalar_field() {
        let manifold = TestEuclideanManifold::new(1);
        let state = CyclicProximalPointState::<f64, M>::new(
            &manifold,
            DVector::from_vec(vec![1.0]),
        );
        assert!(state.scalar_field("lambda").unwrap().is_infinite());
        assert!(state.scalar_field("stepsize").is_none());
    }
}
