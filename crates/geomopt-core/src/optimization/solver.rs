//! Solver state polymorphism and the generic driver loop.
//!
//! Every solver owns a state: the current iterate, the current gradient, the
//! stopping criterion and whatever per-algorithm scratch it needs. The
//! driver [`solve`] is generic over the state and runs the fixed
//! initialize / check / step cycle; it never inspects solver-specific
//! fields.
//!
//! State decorators (debug, record) implement the same two traits, forward
//! every operation to the state they wrap and add behavior at the three
//! [`Hook`] points.

use crate::core::{
    error::SolverResult,
    manifold::Manifold,
    problem::OptimizationProblem,
    types::Scalar,
};
use crate::optimization::stopping_criterion::StoppingCriterion;
use num_traits::Float;
use std::fmt::Debug;

/// The three points at which state decorators fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Once, before the first stopping-criterion check.
    Start,
    /// After each completed solver step.
    Iteration,
    /// Once, after the loop has terminated.
    Stop,
}

/// Common read/write surface of every solver state.
///
/// The trait is object-safe: stopping criteria and decorator actions receive
/// the state as `&dyn SolverState`.
pub trait SolverState<T, M>: Debug
where
    T: Scalar,
    M: Manifold<T>,
{
    /// The current iterate.
    fn iterate(&self) -> &M::Point;

    /// Replaces the current iterate.
    fn set_iterate(&mut self, point: M::Point);

    /// The most recently computed Riemannian gradient.
    fn gradient(&self) -> &M::TangentVector;

    /// Replaces the stored gradient.
    fn set_gradient(&mut self, gradient: M::TangentVector);

    /// The stepsize used by the most recent step.
    ///
    /// Defaults to infinity so stepsize-based criteria stay quiet before the
    /// first step.
    fn last_stepsize(&self) -> T {
        <T as Float>::infinity()
    }

    /// Looks up a named scalar field of the state, e.g. `"stepsize"` or
    /// `"lambda"`. Used by field-based stopping criteria.
    fn scalar_field(&self, _name: &str) -> Option<T> {
        None
    }

    /// Borrows the stopping criterion, when the state owns one.
    fn stopping_criterion(&self) -> Option<&dyn StoppingCriterion<T, M>> {
        None
    }

    /// The stopping reason; empty while the criterion has not triggered.
    fn stop_reason(&self) -> String {
        self.stopping_criterion()
            .map(|criterion| criterion.reason())
            .unwrap_or_default()
    }
}

/// A solver: a state that knows how to initialize itself, perform one step
/// and evaluate its stopping criterion.
pub trait Solver<T, M>: SolverState<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Prepares the state for a fresh run, e.g. computes the initial
    /// gradient and resets stepsize scratch.
    fn initialize(&mut self, problem: &dyn OptimizationProblem<T, M>) -> SolverResult<()>;

    /// Performs one solver step. `iteration` counts from 1.
    fn step(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        iteration: usize,
    ) -> SolverResult<()>;

    /// Evaluates the stopping criterion at `iteration`. A zero iteration
    /// resets the criterion.
    fn check_stop(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        iteration: usize,
    ) -> SolverResult<bool>;

    /// Called once after the loop has terminated, with the final iteration
    /// number. Decorators run their stop-hook actions here.
    fn finalize(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        _iteration: usize,
    ) -> SolverResult<()> {
        Ok(())
    }
}

/// Runs a solver to termination.
///
/// The cycle is fixed and observable: the stopping criterion is checked with
/// the current iteration count, then one step runs, then the iteration
/// decorators fire (inside the state's `step`). The criterion check at
/// iteration zero doubles as its reset, so a criterion that triggers
/// immediately returns without a single step.
pub fn solve<T, M, S>(
    problem: &dyn OptimizationProblem<T, M>,
    state: &mut S,
) -> SolverResult<()>
where
    T: Scalar,
    M: Manifold<T>,
    S: Solver<T, M> + ?Sized,
{
    state.initialize(problem)?;
    tracing::debug!(manifold = problem.manifold().name(), "solver initialized");

    let mut iteration = 0;
    while !state.check_stop(problem, iteration)? {
        iteration += 1;
        state.step(problem, iteration)?;
    }

    tracing::debug!(iteration, reason = %state.stop_reason(), "solver terminated");
    state.finalize(problem, iteration)
}

/// Extracts the minimizer from a finished state.
pub fn get_solver_result<T, M, S>(state: &S) -> M::Point
where
    T: Scalar,
    M: Manifold<T>,
    S: SolverState<T, M> + ?Sized,
{
    state.iterate().clone()
}
