//! Modeling-layer adapter for the geomopt solvers.
//!
//! Algebraic modeling front ends see a manifold as a plain vector of scalar
//! variables. The [`ModelBridge`] translates between the two worlds: it
//! reshapes the vectorized primal start into a manifold point, converts a
//! Euclidean gradient into the Riemannian one on the reshaped point,
//! inverts the sign on maximization, runs the selected solver family and
//! exposes the result per vectorized component together with solver-status
//! flags.
//!
//! The engine never sees the modeling layer; everything in this crate sits
//! strictly on top of the public solver API.

use geomopt_core::core::{
    error::{SolverError, SolverResult},
    manifold::Manifold,
    objective::Objective,
    problem::Problem,
    types::{DVector, Scalar},
};
use geomopt_core::optimization::{
    solver::{solve, SolverState},
    stepsize::ConstantStepsize,
    stopping_criterion::{
        StopAfterIteration, StopWhenAny, StopWhenGradientNormLess, StoppingCriterion,
    },
};
use geomopt_solvers::gradient_descent::GradientDescentState;
use std::collections::HashMap;
use std::fmt::{self, Debug};

/// Option key selecting the solver family.
pub const DESCENT_STATE_TYPE: &str = "descent_state_type";

/// Option key bounding the iteration count.
pub const MAX_ITERATIONS: &str = "max_iterations";

/// Option key for the gradient-norm tolerance.
pub const GRADIENT_TOLERANCE: &str = "gradient_tolerance";

/// Option key selecting a constant stepsize instead of the line search.
pub const STEPSIZE: &str = "stepsize";

/// Solver status reported to the modeling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    /// `optimize` has not run yet.
    OptimizeNotCalled,
    /// The solver terminated at a candidate local solution.
    LocallySolved,
    /// The solve failed; no solution is available.
    NoSolution,
}

/// Availability of a primal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimalStatus {
    /// No result is available.
    NoSolution,
    /// A feasible point (on the manifold) is available.
    FeasiblePoint,
}

/// Optimization sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// Minimize the objective (the engine's native direction).
    Minimize,
    /// Maximize the objective; the bridge inverts the sign.
    Maximize,
}

/// A value in the opaque options map.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// A string, e.g. a solver family name.
    Str(String),
    /// An integer, e.g. an iteration bound.
    Int(i64),
    /// A floating-point number, e.g. a tolerance.
    Float(f64),
    /// A flag.
    Bool(bool),
}

/// Objective over vectorized variables, converted on the fly.
///
/// The cost closure sees the reshaped point; the gradient closure returns a
/// Euclidean gradient which is pushed through the manifold's conversion on
/// the reshaped point.
struct VectorizedObjective<T, F, G> {
    cost: F,
    euclidean_gradient: G,
    sign: T,
}

impl<T, F, G> Debug for VectorizedObjective<T, F, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VectorizedObjective")
    }
}

impl<T, M, F, G> Objective<T, M> for VectorizedObjective<T, F, G>
where
    T: Scalar,
    M: Manifold<T, Point = DVector<T>, TangentVector = DVector<T>>,
    F: Fn(&DVector<T>) -> T,
    G: Fn(&DVector<T>) -> DVector<T>,
{
    fn cost(&self, _manifold: &M, point: &DVector<T>) -> SolverResult<T> {
        Ok(self.sign * (self.cost)(point))
    }

    fn riemannian_gradient(&self, manifold: &M, point: &DVector<T>) -> SolverResult<DVector<T>> {
        let euclidean = (self.euclidean_gradient)(point) * self.sign;
        let mut riemannian = manifold.zero_tangent(point);
        manifold.euclidean_to_riemannian_gradient(point, &euclidean, &mut riemannian)?;
        Ok(riemannian)
    }
}

/// Bridge between a vectorized variable model and the solver engine.
///
/// The number of scalar variables is the product of the manifold's
/// representation shape; variable `i` is component `i` of the flattened
/// point.
#[derive(Debug)]
pub struct ModelBridge<T, M>
where
    T: Scalar,
    M: Manifold<T, Point = DVector<T>, TangentVector = DVector<T>> + Clone + 'static,
{
    manifold: M,
    sense: Sense,
    options: HashMap<String, OptionValue>,
    status: TerminationStatus,
    reason: String,
    solution: Option<DVector<T>>,
}

impl<T, M> ModelBridge<T, M>
where
    T: Scalar,
    M: Manifold<T, Point = DVector<T>, TangentVector = DVector<T>> + Clone + 'static,
{
    /// Creates a bridge for the given manifold.
    pub fn new(manifold: M) -> Self {
        Self {
            manifold,
            sense: Sense::Minimize,
            options: HashMap::new(),
            status: TerminationStatus::OptimizeNotCalled,
            reason: String::new(),
            solution: None,
        }
    }

    /// Number of vectorized scalar variables.
    pub fn variable_count(&self) -> usize {
        self.manifold.representation_shape().iter().product()
    }

    /// Sets the optimization sense.
    pub fn set_sense(&mut self, sense: Sense) {
        self.sense = sense;
    }

    /// Sets an option. Unrecognized keys are kept and ignored, so option
    /// bags stay forward-compatible.
    pub fn set_option<S: Into<String>>(&mut self, key: S, value: OptionValue) {
        self.options.insert(key.into(), value);
    }

    /// Reads an option back.
    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }

    /// The termination status of the most recent solve.
    pub fn termination_status(&self) -> TerminationStatus {
        self.status
    }

    /// Whether a primal result is available.
    pub fn primal_status(&self) -> PrimalStatus {
        if self.solution.is_some() {
            PrimalStatus::FeasiblePoint
        } else {
            PrimalStatus::NoSolution
        }
    }

    /// Dual information is never available.
    pub fn dual_status(&self) -> PrimalStatus {
        PrimalStatus::NoSolution
    }

    /// The trimmed stopping reason of the most recent solve.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The value of vectorized variable `index`, once solved.
    pub fn variable_value(&self, index: usize) -> Option<T> {
        self.solution
            .as_ref()
            .and_then(|solution| solution.get(index).copied())
    }

    /// The full solution vector, once solved.
    pub fn solution(&self) -> Option<&DVector<T>> {
        self.solution.as_ref()
    }

    fn stopping_criterion(&self) -> Box<dyn StoppingCriterion<T, M>> {
        let max_iterations = match self.options.get(MAX_ITERATIONS) {
            Some(OptionValue::Int(n)) if *n > 0 => *n as usize,
            _ => 1000,
        };
        let tolerance = match self.options.get(GRADIENT_TOLERANCE) {
            Some(OptionValue::Float(tol)) if *tol > 0.0 => <T as Scalar>::from_f64(*tol),
            _ => T::DEFAULT_GRADIENT_TOLERANCE,
        };
        StopWhenAny::new(vec![
            StopAfterIteration::new(max_iterations).boxed(),
            StopWhenGradientNormLess::new(tolerance).boxed(),
        ])
        .boxed()
    }

    /// Runs the selected solver family on the vectorized problem.
    ///
    /// `start` is the vectorized primal start; it is reshaped into a
    /// manifold point first, and the Euclidean gradient is converted on the
    /// reshaped point.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a start of the wrong length or an
    /// unknown solver family; solver errors propagate and leave the status
    /// at [`TerminationStatus::NoSolution`].
    pub fn optimize<F, G>(&mut self, start: &[T], cost: F, euclidean_gradient: G) -> SolverResult<()>
    where
        F: Fn(&DVector<T>) -> T,
        G: Fn(&DVector<T>) -> DVector<T>,
    {
        if start.len() != self.variable_count() {
            return Err(SolverError::invalid_configuration(
                "primal start has the wrong number of variables",
                "start",
                format!("{} (expected {})", start.len(), self.variable_count()),
            ));
        }
        let family = match self.options.get(DESCENT_STATE_TYPE) {
            None => "GradientDescentState",
            Some(OptionValue::Str(name)) => name.as_str(),
            Some(other) => {
                return Err(SolverError::invalid_configuration(
                    "solver family must be a string",
                    DESCENT_STATE_TYPE,
                    format!("{:?}", other),
                ))
            }
        };
        if family != "GradientDescentState" && family != "GradientDescent" {
            return Err(SolverError::invalid_configuration(
                "unknown solver family",
                DESCENT_STATE_TYPE,
                family,
            ));
        }

        let initial_point = DVector::from_column_slice(start);
        let sign = match self.sense {
            Sense::Minimize => T::one(),
            Sense::Maximize => -T::one(),
        };
        let objective = VectorizedObjective {
            cost,
            euclidean_gradient,
            sign,
        };

        let mut state = GradientDescentState::new(&self.manifold, initial_point)
            .with_stopping_criterion(self.stopping_criterion());
        if let Some(OptionValue::Float(stepsize)) = self.options.get(STEPSIZE) {
            state = state.with_stepsize(Box::new(ConstantStepsize::new(
                <T as Scalar>::from_f64(*stepsize),
            )?));
        }

        let problem = Problem::new(self.manifold.clone(), objective);
        self.status = TerminationStatus::NoSolution;
        self.solution = None;
        solve(&problem, &mut state)?;

        self.reason = state.stop_reason().trim().to_string();
        self.solution = Some(state.iterate().clone());
        self.status = TerminationStatus::LocallySolved;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geomopt_manifolds::Sphere;

    fn bridge() -> ModelBridge<f64, Sphere> {
        ModelBridge::new(Sphere::new(3).unwrap())
    }

    #[test]
    fn test_statuses_before_optimize() {
        let bridge = bridge();
        assert_eq!(bridge.variable_count(), 3);
        assert_eq!(bridge.termination_status(), TerminationStatus::OptimizeNotCalled);
        assert_eq!(bridge.primal_status(), PrimalStatus::NoSolution);
        assert_eq!(bridge.dual_status(), PrimalStatus::NoSolution);
        assert!(bridge.variable_value(0).is_none());
    }

    #[test]
    fn test_maximize_linear_cost_on_sphere() {
        // max <a, x> over the sphere is attained at a/||a||.
        let mut bridge = bridge();
        bridge.set_sense(Sense::Maximize);
        bridge.set_option(MAX_ITERATIONS, OptionValue::Int(500));

        let a = DVector::from_vec(vec![1.0, 2.0, 2.0]);
        let a_cost = a.clone();
        let a_grad = a.clone();
        bridge
            .optimize(
                &[1.0, 0.0, 0.0],
                move |x: &DVector<f64>| a_cost.dot(x),
                move |_x: &DVector<f64>| a_grad.clone(),
            )
            .unwrap();

        assert_eq!(bridge.termination_status(), TerminationStatus::LocallySolved);
        assert_eq!(bridge.primal_status(), PrimalStatus::FeasiblePoint);
        assert!(!bridge.reason().is_empty());

        let expected = &a / a.norm();
        for i in 0..3 {
            assert_relative_eq!(bridge.variable_value(i).unwrap(), expected[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn test_wrong_start_length_is_a_configuration_error() {
        let mut bridge = bridge();
        let err = bridge
            .optimize(&[1.0, 0.0], |_x| 0.0, |x| x.clone())
            .unwrap_err();
        assert!(matches!(err, SolverError::InvalidConfiguration { .. }));
        assert_eq!(bridge.termination_status(), TerminationStatus::OptimizeNotCalled);
    }

    #[test]
    fn test_unknown_solver_family_is_rejected() {
        let mut bridge = bridge();
        bridge.set_option(
            DESCENT_STATE_TYPE,
            OptionValue::Str("TrustRegionState".to_string()),
        );
        let err = bridge
            .optimize(&[1.0, 0.0, 0.0], |_x| 0.0, |x| x.clone())
            .unwrap_err();
        assert!(matches!(err, SolverError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_unrecognized_options_are_kept_and_ignored() {
        let mut bridge = bridge();
        bridge.set_option("verbosity", OptionValue::Bool(true));
        assert_eq!(bridge.option("verbosity"), Some(&OptionValue::Bool(true)));

        let a = DVector::from_vec(vec![0.0, 0.0, 1.0]);
        let a_grad = a.clone();
        bridge
            .optimize(
                &[1.0, 0.0, 0.0],
                move |x: &DVector<f64>| -a.dot(x),
                move |_x: &DVector<f64>| -a_grad.clone(),
            )
            .unwrap();
        assert_eq!(bridge.termination_status(), TerminationStatus::LocallySolved);
    }
}
