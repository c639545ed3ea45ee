//! Stepsize rules for descent solvers.
//!
//! A stepsize rule turns the current iterate, gradient and search direction
//! into a scalar step length. The rules in this module are the constant
//! stepsize, a polynomially decaying schedule and Armijo backtracking line
//! search on the manifold.

use crate::core::{
    error::{SolverError, SolverResult},
    manifold::{Manifold, RetractionMethod},
    problem::OptimizationProblem,
    types::Scalar,
};
use num_traits::Float;
use std::fmt::Debug;

/// Stepsize rule interface.
///
/// `compute` receives the pieces of the state it may read (iterate, gradient
/// and search direction) explicitly, which keeps the rule independent of the
/// concrete state type. The most recent value stays observable through
/// [`last_stepsize`](Stepsize::last_stepsize) for stepsize-based stopping
/// criteria.
pub trait Stepsize<T, M>: Debug
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Determines the stepsize for the given search direction.
    fn compute(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        point: &M::Point,
        gradient: &M::TangentVector,
        direction: &M::TangentVector,
        iteration: usize,
    ) -> SolverResult<T>;

    /// The most recently computed stepsize.
    fn last_stepsize(&self) -> T;

    /// Returns the name of this stepsize rule.
    fn name(&self) -> &str;
}

/// Fixed stepsize, independent of all inputs.
#[derive(Debug, Clone)]
pub struct ConstantStepsize<T> {
    stepsize: T,
}

impl<T: Scalar> ConstantStepsize<T> {
    /// Creates a constant stepsize rule.
    ///
    /// # Errors
    ///
    /// Returns an error when `stepsize` is not positive.
    pub fn new(stepsize: T) -> SolverResult<Self> {
        if stepsize <= T::zero() {
            return Err(SolverError::invalid_configuration(
                "stepsize must be positive",
                "stepsize",
                format!("{}", stepsize),
            ));
        }
        Ok(Self { stepsize })
    }
}

impl<T, M> Stepsize<T, M> for ConstantStepsize<T>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn compute(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        _point: &M::Point,
        _gradient: &M::TangentVector,
        _direction: &M::TangentVector,
        _iteration: usize,
    ) -> SolverResult<T> {
        Ok(self.stepsize)
    }

    fn last_stepsize(&self) -> T {
        self.stepsize
    }

    fn name(&self) -> &str {
        "constant stepsize"
    }
}

/// Polynomially decaying stepsize α_k = α₀ / (1 + βk)^p.
///
/// With p in (0.5, 1] the schedule satisfies the classical non-summable /
/// square-summable conditions.
#[derive(Debug, Clone)]
pub struct DecreasingStepsize<T> {
    initial: T,
    decay_rate: T,
    power: T,
    last: T,
}

impl<T: Scalar> DecreasingStepsize<T> {
    /// Creates a decaying stepsize rule.
    ///
    /// # Errors
    ///
    /// Returns an error when `initial`, `decay_rate` or `power` is not
    /// positive.
    pub fn new(initial: T, decay_rate: T, power: T) -> SolverResult<Self> {
        if initial <= T::zero() {
            return Err(SolverError::invalid_configuration(
                "initial stepsize must be positive",
                "initial",
                format!("{}", initial),
            ));
        }
        if decay_rate <= T::zero() || power <= T::zero() {
            return Err(SolverError::invalid_configuration(
                "decay rate and power must be positive",
                "decay_rate/power",
                format!("{}/{}", decay_rate, power),
            ));
        }
        Ok(Self {
            initial,
            decay_rate,
            power,
            last: initial,
        })
    }
}

impl<T, M> Stepsize<T, M> for DecreasingStepsize<T>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn compute(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        _point: &M::Point,
        _gradient: &M::TangentVector,
        _direction: &M::TangentVector,
        iteration: usize,
    ) -> SolverResult<T> {
        let k = <T as Scalar>::from_usize(iteration);
        let denominator = <T as Float>::powf(T::one() + self.decay_rate * k, self.power);
        self.last = self.initial / denominator;
        Ok(self.last)
    }

    fn last_stepsize(&self) -> T {
        self.last
    }

    fn name(&self) -> &str {
        "decreasing stepsize"
    }
}

/// Armijo backtracking line search on the manifold.
///
/// Starting from the initial trial step, the step is contracted until the
/// sufficient-decrease condition
/// `f(R_p(t d)) <= f(p) + σ t ⟨grad f(p), d⟩` holds or the step reaches the
/// configured floor. A non-descent direction is replaced by the negative
/// gradient before the search starts.
#[derive(Debug, Clone)]
pub struct ArmijoLinesearch<T> {
    initial_stepsize: T,
    contraction: T,
    sufficient_decrease: T,
    min_stepsize: T,
    retraction: Option<RetractionMethod>,
    last: T,
}

impl<T: Scalar> ArmijoLinesearch<T> {
    /// Creates an Armijo backtracking rule.
    ///
    /// # Errors
    ///
    /// Returns an error unless `initial_stepsize > 0`,
    /// `contraction ∈ (0, 1)`, `sufficient_decrease ∈ (0, 1)` and
    /// `min_stepsize > 0`.
    pub fn new(
        initial_stepsize: T,
        contraction: T,
        sufficient_decrease: T,
        min_stepsize: T,
    ) -> SolverResult<Self> {
        if initial_stepsize <= T::zero() {
            return Err(SolverError::invalid_configuration(
                "initial stepsize must be positive",
                "initial_stepsize",
                format!("{}", initial_stepsize),
            ));
        }
        if contraction <= T::zero() || contraction >= T::one() {
            return Err(SolverError::invalid_configuration(
                "contraction factor must lie in (0, 1)",
                "contraction",
                format!("{}", contraction),
            ));
        }
        if sufficient_decrease <= T::zero() || sufficient_decrease >= T::one() {
            return Err(SolverError::invalid_configuration(
                "sufficient decrease must lie in (0, 1)",
                "sufficient_decrease",
                format!("{}", sufficient_decrease),
            ));
        }
        if min_stepsize <= T::zero() {
            return Err(SolverError::invalid_configuration(
                "minimal stepsize must be positive",
                "min_stepsize",
                format!("{}", min_stepsize),
            ));
        }
        Ok(Self {
            initial_stepsize,
            contraction,
            sufficient_decrease,
            min_stepsize,
            retraction: None,
            last: initial_stepsize,
        })
    }

    /// Overrides the retraction used for the trial points.
    pub fn with_retraction(mut self, method: RetractionMethod) -> Self {
        self.retraction = Some(method);
        self
    }
}

impl<T: Scalar> Default for ArmijoLinesearch<T> {
    fn default() -> Self {
        Self {
            initial_stepsize: T::one(),
            contraction: <T as Scalar>::from_f64(0.95),
            sufficient_decrease: <T as Scalar>::from_f64(0.1),
            min_stepsize: <T as Scalar>::from_f64(1e-10),
            retraction: None,
            last: T::one(),
        }
    }
}

impl<T, M> Stepsize<T, M> for ArmijoLinesearch<T>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn compute(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        point: &M::Point,
        gradient: &M::TangentVector,
        direction: &M::TangentVector,
        _iteration: usize,
    ) -> SolverResult<T> {
        let manifold = problem.manifold();
        let retraction = self
            .retraction
            .unwrap_or_else(|| manifold.default_retraction());

        let value = problem.cost(point)?;
        let mut slope = manifold.inner_product(point, gradient, direction)?;

        // A descent direction has non-positive slope; otherwise fall back to
        // the negative gradient.
        let fallback;
        let direction = if slope > T::zero() {
            let mut negated = manifold.zero_tangent(point);
            manifold.scale_tangent(point, -T::one(), gradient, &mut negated)?;
            slope = manifold.inner_product(point, gradient, &negated)?;
            fallback = negated;
            &fallback
        } else {
            direction
        };

        let mut stepsize = self.initial_stepsize;
        let mut scaled = manifold.zero_tangent(point);
        let mut candidate = point.clone();
        loop {
            manifold.scale_tangent(point, stepsize, direction, &mut scaled)?;
            manifold.retract(point, &scaled, retraction, &mut candidate)?;
            let trial = problem.cost(&candidate)?;
            let bound = value + self.sufficient_decrease * stepsize * slope;
            // The comparison is arranged so a non-finite trial value keeps
            // backtracking.
            if trial <= bound || stepsize <= self.min_stepsize {
                break;
            }
            stepsize = self.contraction * stepsize;
        }

        tracing::debug!(
            stepsize = stepsize.to_f64(),
            "armijo backtracking finished"
        );
        self.last = stepsize;
        Ok(stepsize)
    }

    fn last_stepsize(&self) -> T {
        self.last
    }

    fn name(&self) -> &str {
        "armijo backtracking"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DVector;
    use crate::test_utils::{quadratic_problem, TestEuclideanManifold};
    use approx::assert_relative_eq;

    type BoxedRule = Box<dyn Stepsize<f64, TestEuclideanManifold>>;

    #[test]
    fn test_constant_stepsize() {
        let problem = quadratic_problem(2);
        let point = DVector::from_vec(vec![1.0, 1.0]);
        let gradient = point.clone();
        let direction = -&gradient;

        let mut rule: BoxedRule = Box::new(ConstantStepsize::new(0.1).unwrap());
        let stepsize = rule
            .compute(&problem, &point, &gradient, &direction, 1)
            .unwrap();
        assert_eq!(stepsize, 0.1);
        assert_eq!(rule.last_stepsize(), 0.1);
    }

    #[test]
    fn test_constant_stepsize_rejects_nonpositive() {
        assert!(ConstantStepsize::new(0.0).is_err());
        assert!(ConstantStepsize::new(-1.0).is_err());
    }

    #[test]
    fn test_decreasing_stepsize_schedule() {
        let problem = quadratic_problem(1);
        let point = DVector::from_vec(vec![1.0]);
        let gradient = point.clone();
        let direction = -&gradient;

        let mut rule: BoxedRule = Box::new(DecreasingStepsize::new(1.0, 0.1, 2.0).unwrap());
        assert_relative_eq!(
            rule.compute(&problem, &point, &gradient, &direction, 0)
                .unwrap(),
            1.0
        );
        // At k = 10: 1 / (1 + 0.1 * 10)^2 = 0.25.
        assert_relative_eq!(
            rule.compute(&problem, &point, &gradient, &direction, 10)
                .unwrap(),
            0.25
        );
    }

    #[test]
    fn test_armijo_satisfies_sufficient_decrease() {
        let problem = quadratic_problem(2);
        let point = DVector::from_vec(vec![3.0, 4.0]);
        let gradient = point.clone();
        let direction = -&gradient;

        let mut rule = ArmijoLinesearch::new(1.0, 0.5, 1e-4, 1e-12).unwrap();
        let stepsize = Stepsize::<f64, TestEuclideanManifold>::compute(
            &mut rule, &problem, &point, &gradient, &direction, 1,
        )
        .unwrap();

        // Either the floor was hit or the Armijo condition holds.
        let value = problem.cost(&point).unwrap();
        let slope = gradient.dot(&direction);
        let candidate = &point + &direction * stepsize;
        let trial = problem.cost(&candidate).unwrap();
        assert!(stepsize <= 1e-12 || trial <= value + 1e-4 * stepsize * slope);
        // For the quadratic the full step is already acceptable.
        assert_relative_eq!(stepsize, 1.0);
    }

    #[test]
    fn test_armijo_backtracks_on_too_long_steps() {
        // Cost with a narrow valley: large steps overshoot.
        let problem = crate::test_utils::scaled_quadratic_problem(1, 100.0);
        let point = DVector::from_vec(vec![1.0]);
        let gradient = DVector::from_vec(vec![100.0]);
        let direction = -&gradient;

        let mut rule = ArmijoLinesearch::new(1.0, 0.5, 0.1, 1e-14).unwrap();
        let stepsize = Stepsize::<f64, TestEuclideanManifold>::compute(
            &mut rule, &problem, &point, &gradient, &direction, 1,
        )
        .unwrap();

        assert!(stepsize < 1.0);
        let value = problem.cost(&point).unwrap();
        let slope = gradient.dot(&direction);
        let candidate = &point + &direction * stepsize;
        let trial = problem.cost(&candidate).unwrap();
        assert!(trial <= value + 0.1 * stepsize * slope);
    }

    #[test]
    fn test_armijo_resets_non_descent_direction() {
        let problem = quadratic_problem(1);
        let point = DVector::from_vec(vec![2.0]);
        let gradient = DVector::from_vec(vec![2.0]);
        // Ascent direction: the rule must fall back to -gradient.
        let direction = gradient.clone();

        let mut rule = ArmijoLinesearch::new(1.0, 0.5, 1e-4, 1e-12).unwrap();
        let stepsize = Stepsize::<f64, TestEuclideanManifold>::compute(
            &mut rule, &problem, &point, &gradient, &direction, 1,
        )
        .unwrap();

        let value = problem.cost(&point).unwrap();
        let candidate = &point - &gradient * stepsize;
        assert!(problem.cost(&candidate).unwrap() < value);
    }

    #[test]
    fn test_armijo_parameter_validation() {
        assert!(ArmijoLinesearch::new(0.0, 0.5, 0.1, 1e-10).is_err());
        assert!(ArmijoLinesearch::new(1.0, 1.0, 0.1, 1e-10).is_err());
        assert!(ArmijoLinesearch::new(1.0, 0.5, 0.0, 1e-10).is_err());
        assert!(ArmijoLinesearch::new(1.0, 0.5, 0.1, 0.0).is_err());
    }
}
