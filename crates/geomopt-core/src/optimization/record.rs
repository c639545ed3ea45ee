//! Recording decorator and record actions.
//!
//! A [`RecordSolverState`] wraps any solver state, forwards the whole solver
//! surface to it and appends typed values to per-hook records as the driver
//! runs. Records are retrievable after the solve through
//! [`RecordSolverState::recorded`].
//!
//! Record actions receive the iteration as a signed integer: a negative
//! value resets the action's buffer, which composite solvers use when they
//! restart an inner solver.

use crate::core::{
    error::SolverResult,
    manifold::Manifold,
    problem::OptimizationProblem,
    types::Scalar,
};
use crate::optimization::solver::{Hook, Solver, SolverState};
use crate::optimization::stopping_criterion::StoppingCriterion;
use crate::optimization::storage::{self, StoreStateAction};
use std::collections::HashMap;
use std::fmt::Debug;

/// A value appended to a record.
#[derive(Debug)]
pub enum RecordedValue<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// An iteration number.
    Iteration(usize),
    /// A scalar, e.g. a cost value or a norm.
    Scalar(T),
    /// A deep copy of a point.
    Point(M::Point),
    /// A deep copy of a tangent vector.
    Tangent(M::TangentVector),
    /// An atomic tuple written by a [`RecordGroup`].
    Group(Vec<RecordedValue<T, M>>),
}

// Manual impl: a derive would demand `M: Clone`, but only the point and
// tangent representations need to be cloneable.
impl<T, M> Clone for RecordedValue<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn clone(&self) -> Self {
        match self {
            Self::Iteration(iteration) => Self::Iteration(*iteration),
            Self::Scalar(value) => Self::Scalar(*value),
            Self::Point(point) => Self::Point(point.clone()),
            Self::Tangent(tangent) => Self::Tangent(tangent.clone()),
            Self::Group(values) => Self::Group(values.clone()),
        }
    }
}

impl<T, M> RecordedValue<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// The contained iteration number, if this is an iteration entry.
    pub fn as_iteration(&self) -> Option<usize> {
        match self {
            Self::Iteration(iteration) => Some(*iteration),
            _ => None,
        }
    }

    /// The contained scalar, if this is a scalar entry.
    pub fn as_scalar(&self) -> Option<T> {
        match self {
            Self::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    /// The contained tuple, if this is a group entry.
    pub fn as_group(&self) -> Option<&[RecordedValue<T, M>]> {
        match self {
            Self::Group(values) => Some(values),
            _ => None,
        }
    }
}

/// An action invoked by the record decorator at a hook point.
pub trait RecordAction<T, M>: Debug
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Appends a value derived from the current state. A negative
    /// `iteration` resets the buffer instead.
    fn record(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()>;

    /// The values recorded so far.
    fn recorded(&self) -> &[RecordedValue<T, M>];

    /// The values recorded under a named sub-action, for grouped actions.
    fn recorded_for(&self, _key: &str) -> Option<&[RecordedValue<T, M>]> {
        None
    }
}

/// Records the iteration number.
#[derive(Debug)]
pub struct RecordIteration<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    values: Vec<RecordedValue<T, M>>,
}

impl<T, M> RecordIteration<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Creates the action.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }
}

impl<T, M> RecordAction<T, M> for RecordIteration<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn record(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        _state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration < 0 {
            self.values.clear();
            return Ok(());
        }
        self.values.push(RecordedValue::Iteration(iteration as usize));
        Ok(())
    }

    fn recorded(&self) -> &[RecordedValue<T, M>] {
        &self.values
    }
}

/// Records the cost at the current iterate.
#[derive(Debug)]
pub struct RecordCost<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    values: Vec<RecordedValue<T, M>>,
}

impl<T, M> RecordCost<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Creates the action.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }
}

impl<T, M> RecordAction<T, M> for RecordCost<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn record(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration < 0 {
            self.values.clear();
            return Ok(());
        }
        let cost = problem.cost(state.iterate())?;
        self.values.push(RecordedValue::Scalar(cost));
        Ok(())
    }

    fn recorded(&self) -> &[RecordedValue<T, M>] {
        &self.values
    }
}

/// Records a deep copy of the current gradient.
#[derive(Debug)]
pub struct RecordGradient<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    values: Vec<RecordedValue<T, M>>,
}

impl<T, M> RecordGradient<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Creates the action.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }
}

impl<T, M> RecordAction<T, M> for RecordGradient<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn record(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration < 0 {
            self.values.clear();
            return Ok(());
        }
        self.values
            .push(RecordedValue::Tangent(state.gradient().clone()));
        Ok(())
    }

    fn recorded(&self) -> &[RecordedValue<T, M>] {
        &self.values
    }
}

/// Records the Riemannian gradient norm.
#[derive(Debug)]
pub struct RecordGradientNorm<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    values: Vec<RecordedValue<T, M>>,
}

impl<T, M> RecordGradientNorm<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Creates the action.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }
}

impl<T, M> RecordAction<T, M> for RecordGradientNorm<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn record(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration < 0 {
            self.values.clear();
            return Ok(());
        }
        let norm = problem
            .manifold()
            .norm(state.iterate(), state.gradient())?;
        self.values.push(RecordedValue::Scalar(norm));
        Ok(())
    }

    fn recorded(&self) -> &[RecordedValue<T, M>] {
        &self.values
    }
}

/// Records the distance between successive iterates.
#[derive(Debug)]
pub struct RecordChange<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    storage: StoreStateAction<T, M>,
    values: Vec<RecordedValue<T, M>>,
}

impl<T, M> RecordChange<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Creates the action.
    pub fn new() -> Self {
        Self {
            storage: StoreStateAction::new(),
            values: Vec::new(),
        }
    }
}

impl<T, M> Default for RecordChange<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, M> RecordAction<T, M> for RecordChange<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn record(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration < 0 {
            self.values.clear();
            self.storage.reset();
            return Ok(());
        }
        let manifold = problem.manifold();
        let change = match self.storage.point(storage::ITERATE) {
            Some(old) => manifold.distance(old, state.iterate())?,
            None => T::zero(),
        };
        self.values.push(RecordedValue::Scalar(change));
        self.storage.store_point(storage::ITERATE, state.iterate());
        Ok(())
    }

    fn recorded(&self) -> &[RecordedValue<T, M>] {
        &self.values
    }
}

/// Bundles several actions; each invocation appends one atomic tuple.
#[derive(Debug)]
pub struct RecordGroup<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    entries: Vec<(&'static str, Box<dyn RecordAction<T, M>>)>,
    values: Vec<RecordedValue<T, M>>,
}

impl<T, M> RecordGroup<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Creates a group from named sub-actions.
    pub fn new(entries: Vec<(&'static str, Box<dyn RecordAction<T, M>>)>) -> Self {
        Self {
            entries,
            values: Vec::new(),
        }
    }
}

impl<T, M> RecordAction<T, M> for RecordGroup<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn record(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration < 0 {
            for (_, action) in &mut self.entries {
                action.record(problem, state, iteration)?;
            }
            self.values.clear();
            return Ok(());
        }
        let mut tuple = Vec::with_capacity(self.entries.len());
        for (_, action) in &mut self.entries {
            action.record(problem, state, iteration)?;
            if let Some(last) = action.recorded().last() {
                tuple.push(last.clone());
            }
        }
        self.values.push(RecordedValue::Group(tuple));
        Ok(())
    }

    fn recorded(&self) -> &[RecordedValue<T, M>] {
        &self.values
    }

    fn recorded_for(&self, key: &str) -> Option<&[RecordedValue<T, M>]> {
        self.entries
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, action)| action.recorded())
    }
}

/// Delegates to the wrapped action only on every `k`-th iteration.
#[derive(Debug)]
pub struct RecordEvery<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    inner: Box<dyn RecordAction<T, M>>,
    every: usize,
}

impl<T, M> RecordEvery<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Wraps `inner`, firing only when the iteration is a positive multiple
    /// of `every`.
    pub fn new(inner: Box<dyn RecordAction<T, M>>, every: usize) -> Self {
        Self {
            inner,
            every: every.max(1),
        }
    }
}

impl<T, M> RecordAction<T, M> for RecordEvery<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn record(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration < 0 {
            return self.inner.record(problem, state, iteration);
        }
        if iteration > 0 && iteration as usize % self.every == 0 {
            return self.inner.record(problem, state, iteration);
        }
        Ok(())
    }

    fn recorded(&self) -> &[RecordedValue<T, M>] {
        self.inner.recorded()
    }

    fn recorded_for(&self, key: &str) -> Option<&[RecordedValue<T, M>]> {
        self.inner.recorded_for(key)
    }
}

/// State decorator that runs record actions at the driver hooks.
#[derive(Debug)]
pub struct RecordSolverState<T, M, S>
where
    T: Scalar,
    M: Manifold<T>,
    S: Solver<T, M>,
{
    state: S,
    actions: HashMap<Hook, Box<dyn RecordAction<T, M>>>,
}

impl<T, M, S> RecordSolverState<T, M, S>
where
    T: Scalar,
    M: Manifold<T>,
    S: Solver<T, M>,
{
    /// Wraps a state without any actions; transparent until actions are
    /// added.
    pub fn new(state: S) -> Self {
        Self {
            state,
            actions: HashMap::new(),
        }
    }

    /// Attaches an action to a hook, replacing any previous one. Use a
    /// [`RecordGroup`] to attach several.
    pub fn with(mut self, hook: Hook, action: Box<dyn RecordAction<T, M>>) -> Self {
        self.actions.insert(hook, action);
        self
    }

    /// The values recorded at `hook` (empty when no action is attached).
    pub fn recorded(&self, hook: Hook) -> &[RecordedValue<T, M>] {
        self.actions
            .get(&hook)
            .map(|action| action.recorded())
            .unwrap_or(&[])
    }

    /// The values recorded under `key` within the grouped action at `hook`.
    pub fn recorded_for(&self, hook: Hook, key: &str) -> Option<&[RecordedValue<T, M>]> {
        self.actions
            .get(&hook)
            .and_then(|action| action.recorded_for(key))
    }

    /// Borrows the action attached at `hook`.
    pub fn record_action(&self, hook: Hook) -> Option<&dyn RecordAction<T, M>> {
        self.actions.get(&hook).map(|action| action.as_ref())
    }

    /// Borrows the wrapped state.
    pub fn inner(&self) -> &S {
        &self.state
    }

    /// Mutably borrows the wrapped state.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Unwraps the decorator.
    pub fn into_inner(self) -> S {
        self.state
    }

    fn run_hook(
        &mut self,
        hook: Hook,
        problem: &dyn OptimizationProblem<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if let Some(action) = self.actions.get_mut(&hook) {
            action.record(problem, &self.state, iteration)?;
        }
        Ok(())
    }
}

impl<T, M, S> SolverState<T, M> for RecordSolverState<T, M, S>
where
    T: Scalar,
    M: Manifold<T>,
    S: Solver<T, M>,
{
    fn iterate(&self) -> &M::Point {
        self.state.iterate()
    }

    fn set_iterate(&mut self, point: M::Point) {
        self.state.set_iterate(point);
    }

    fn gradient(&self) -> &M::TangentVector {
        self.state.gradient()
    }

    fn set_gradient(&mut self, gradient: M::TangentVector) {
        self.state.set_gradient(gradient);
    }

    fn last_stepsize(&self) -> T {
        self.state.last_stepsize()
    }

    fn scalar_field(&self, name: &str) -> Option<T> {
        self.state.scalar_field(name)
    }

    fn stopping_criterion(&self) -> Option<&dyn StoppingCriterion<T, M>> {
        self.state.stopping_criterion()
    }

    fn stop_reason(&self) -> String {
        self.state.stop_reason()
    }
}

impl<T, M, S> Solver<T, M> for RecordSolverState<T, M, S>
where
    T: Scalar,
    M: Manifold<T>,
    S: Solver<T, M>,
{
    fn initialize(&mut self, problem: &dyn OptimizationProblem<T, M>) -> SolverResult<()> {
        self.state.initialize(problem)?;
        self.run_hook(Hook::Start, problem, 0)
    }

    fn step(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        iteration: usize,
    ) -> SolverResult<()> {
        self.state.step(problem, iteration)?;
        self.run_hook(Hook::Iteration, problem, iteration as i64)
    }

    fn check_stop(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        self.state.check_stop(problem, iteration)
    }

    fn finalize(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        iteration: usize,
    ) -> SolverResult<()> {
        self.state.finalize(problem, iteration)?;
        self.run_hook(Hook::Stop, problem, iteration as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DVector;
    use crate::test_utils::{quadratic_problem, TestEuclideanManifold, TestState};

    type Action = Box<dyn RecordAction<f64, TestEuclideanManifold>>;

    fn state_at(value: f64) -> TestState {
        TestState::new(
            DVector::from_vec(vec![value]),
            DVector::from_vec(vec![value]),
        )
    }

    #[test]
    fn test_record_every_subsamples() {
        let problem = quadratic_problem(1);
        let state = state_at(1.0);
        let mut action = RecordEvery::new(
            Box::new(RecordIteration::new()) as Action,
            6,
        );

        for i in 0..=42 {
            action.record(&problem, &state, i).unwrap();
        }

        let iterations: Vec<usize> = action
            .recorded()
            .iter()
            .filter_map(|value| value.as_iteration())
            .collect();
        assert_eq!(iterations, vec![6, 12, 18, 24, 30, 36, 42]);
    }

    #[test]
    fn test_record_group_snapshots_tuples() {
        let problem = quadratic_problem(1);
        let state = state_at(3.0);
        let mut group = RecordGroup::new(vec![
            ("Iteration", Box::new(RecordIteration::new()) as Action),
            ("Cost", Box::new(RecordCost::new()) as Action),
        ]);

        group.record(&problem, &state, 1).unwrap();
        group.record(&problem, &state, 2).unwrap();

        assert_eq!(group.recorded().len(), 2);
        let tuple = group.recorded()[0].as_group().unwrap();
        assert_eq!(tuple[0].as_iteration(), Some(1));
        assert_eq!(tuple[1].as_scalar(), Some(4.5));

        let costs = group.recorded_for("Cost").unwrap();
        assert_eq!(costs.len(), 2);
        assert!(group.recorded_for("Gradient").is_none());
    }

    #[test]
    fn test_negative_iteration_resets() {
        let problem = quadratic_problem(1);
        let state = state_at(1.0);
        let mut action = RecordIteration::<f64, TestEuclideanManifold>::new();

        action.record(&problem, &state, 1).unwrap();
        action.record(&problem, &state, 2).unwrap();
        assert_eq!(RecordAction::<f64, TestEuclideanManifold>::recorded(&action).len(), 2);

        action.record(&problem, &state, -1).unwrap();
        assert!(RecordAction::<f64, TestEuclideanManifold>::recorded(&action).is_empty());
    }

    #[test]
    fn test_record_change_starts_at_zero() {
        let problem = quadratic_problem(1);
        let mut action = RecordChange::<f64, TestEuclideanManifold>::new();

        action.record(&problem, &state_at(1.0), 1).unwrap();
        action.record(&problem, &state_at(3.0), 2).unwrap();

        let changes: Vec<f64> = action
            .recorded()
            .iter()
            .filter_map(|value| value.as_scalar())
            .collect();
        assert_eq!(changes, vec![0.0, 2.0]);
    }
}
