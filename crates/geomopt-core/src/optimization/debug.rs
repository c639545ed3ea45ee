//! Debug decorator and debug actions.
//!
//! A [`DebugSolverState`] wraps any solver state and prints formatted
//! fragments to an injectable text sink at the driver hooks. Atomic actions
//! write space-terminated fragments; a [`DebugGroup`] terminates the line,
//! so one iteration produces one line of output.

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
use std::fmt::{self, Debug};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Shared, injectable text sink for debug output.
///
/// Defaults to stdout; tests inject a shared byte buffer. Write failures on
/// the diagnostics channel are swallowed so they cannot end a solve.
#[derive(Clone)]
pub struct DebugSink(Arc<Mutex<dyn Write + Send>>);

impl DebugSink {
    /// A sink writing to stdout.
    pub fn stdout() -> Self {
        Self(Arc::new(Mutex::new(std::io::stdout())))
    }

    /// A sink writing to the given writer.
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self(Arc::new(Mutex::new(writer)))
    }

    /// A sink writing into a shared buffer, returned alongside it.
    pub fn buffer() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Self(buffer.clone());
        (sink, buffer)
    }

    /// Writes a text fragment.
    pub fn emit(&self, text: &str) {
        if let Ok(mut writer) = self.0.lock() {
            let _ = writer.write_all(text.as_bytes());
        }
    }
}

impl Default for DebugSink {
    fn default() -> Self {
        Self::stdout()
    }
}

impl Debug for DebugSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DebugSink")
    }
}

/// An action invoked by the debug decorator at a hook point.
pub trait DebugAction<T, M>: Debug
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Writes a fragment derived from the current state.
    fn act(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()>;
}

/// Prints the iteration number as `# k`.
#[derive(Debug)]
pub struct DebugIteration {
    sink: DebugSink,
}

impl DebugIteration {
    /// Creates the action.
    pub fn new(sink: DebugSink) -> Self {
        Self { sink }
    }
}

impl<T, M> DebugAction<T, M> for DebugIteration
where
    T: Scalar,
    M: Manifold<T>,
{
    fn act(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        _state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration >= 0 {
            self.sink.emit(&format!("# {} ", iteration));
        }
        Ok(())
    }
}

/// Prints the cost prefixed by a label, `f(x): <value>` by default.
#[derive(Debug)]
pub struct DebugCost {
    prefix: String,
    sink: DebugSink,
}

impl DebugCost {
    /// Creates the action with the default prefix.
    pub fn new(sink: DebugSink) -> Self {
        Self::with_prefix("f(x):", sink)
    }

    /// Creates the action with a custom prefix.
    pub fn with_prefix<S: Into<String>>(prefix: S, sink: DebugSink) -> Self {
        Self {
            prefix: prefix.into(),
            sink,
        }
    }
}

impl<T, M> DebugAction<T, M> for DebugCost
where
    T: Scalar,
    M: Manifold<T>,
{
    fn act(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration >= 0 {
            let cost = problem.cost(state.iterate())?;
            self.sink.emit(&format!("{} {} ", self.prefix, cost));
        }
        Ok(())
    }
}

/// Prints the Riemannian gradient norm.
#[derive(Debug)]
pub struct DebugGradientNorm {
    prefix: String,
    sink: DebugSink,
}

impl DebugGradientNorm {
    /// Creates the action with the default prefix.
    pub fn new(sink: DebugSink) -> Self {
        Self::with_prefix("|grad f(x)|:", sink)
    }

    /// Creates the action with a custom prefix.
    pub fn with_prefix<S: Into<String>>(prefix: S, sink: DebugSink) -> Self {
        Self {
            prefix: prefix.into(),
            sink,
        }
    }
}

impl<T, M> DebugAction<T, M> for DebugGradientNorm
where
    T: Scalar,
    M: Manifold<T>,
{
    fn act(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration >= 0 {
            let norm = problem
                .manifold()
                .norm(state.iterate(), state.gradient())?;
            self.sink.emit(&format!("{} {} ", self.prefix, norm));
        }
        Ok(())
    }
}

/// Prints the stepsize of the most recent step.
#[derive(Debug)]
pub struct DebugStepsize {
    prefix: String,
    sink: DebugSink,
}

impl DebugStepsize {
    /// Creates the action with the default prefix.
    pub fn new(sink: DebugSink) -> Self {
        Self {
            prefix: "s:".to_string(),
            sink,
        }
    }
}

impl<T, M> DebugAction<T, M> for DebugStepsize
where
    T: Scalar,
    M: Manifold<T>,
{
    fn act(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration > 0 {
            self.sink
                .emit(&format!("{} {} ", self.prefix, state.last_stepsize()));
        }
        Ok(())
    }
}

/// Prints the distance between successive iterates; owns its snapshot.
#[derive(Debug)]
pub struct DebugChange<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    prefix: String,
    storage: StoreStateAction<T, M>,
    sink: DebugSink,
}

impl<T, M> DebugChange<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Creates the action with the default prefix.
    pub fn new(sink: DebugSink) -> Self {
        Self {
            prefix: "|Δp|:".to_string(),
            storage: StoreStateAction::new(),
            sink,
        }
    }
}

impl<T, M> DebugAction<T, M> for DebugChange<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn act(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration < 0 {
            self.storage.reset();
            return Ok(());
        }
        if let Some(old) = self.storage.point(storage::ITERATE) {
            let change = problem.manifold().distance(old, state.iterate())?;
            self.sink.emit(&format!("{} {} ", self.prefix, change));
        }
        self.storage.store_point(storage::ITERATE, state.iterate());
        Ok(())
    }
}

/// Prints a fixed piece of text.
#[derive(Debug)]
pub struct DebugDivider {
    text: String,
    sink: DebugSink,
}

impl DebugDivider {
    /// Creates the action.
    pub fn new<S: Into<String>>(text: S, sink: DebugSink) -> Self {
        Self {
            text: text.into(),
            sink,
        }
    }
}

impl<T, M> DebugAction<T, M> for DebugDivider
where
    T: Scalar,
    M: Manifold<T>,
{
    fn act(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        _state: &dyn SolverState<T, M>,
        _iteration: i64,
    ) -> SolverResult<()> {
        self.sink.emit(&format!("{} ", self.text));
        Ok(())
    }
}

/// Prints the stopping reason; useful at the stop hook.
#[derive(Debug)]
pub struct DebugStoppingReason {
    sink: DebugSink,
}

impl DebugStoppingReason {
    /// Creates the action.
    pub fn new(sink: DebugSink) -> Self {
        Self { sink }
    }
}

impl<T, M> DebugAction<T, M> for DebugStoppingReason
where
    T: Scalar,
    M: Manifold<T>,
{
    fn act(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        _iteration: i64,
    ) -> SolverResult<()> {
        let reason = state.stop_reason();
        if !reason.is_empty() {
            self.sink.emit(&format!("{}\n", reason));
        }
        Ok(())
    }
}

/// Runs a list of actions and terminates the output line.
#[derive(Debug)]
pub struct DebugGroup<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    actions: Vec<Box<dyn DebugAction<T, M>>>,
    sink: DebugSink,
}

impl<T, M> DebugGroup<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Creates a group from actions sharing a sink for the line terminator.
    pub fn new(actions: Vec<Box<dyn DebugAction<T, M>>>, sink: DebugSink) -> Self {
        Self { actions, sink }
    }
}

impl<T, M> DebugAction<T, M> for DebugGroup<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn act(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        for action in &mut self.actions {
            action.act(problem, state, iteration)?;
        }
        if iteration >= 0 && !self.actions.is_empty() {
            self.sink.emit("\n");
        }
        Ok(())
    }
}

/// Delegates to the wrapped action only on every `k`-th iteration.
#[derive(Debug)]
pub struct DebugEvery<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    inner: Box<dyn DebugAction<T, M>>,
    every: usize,
}

impl<T, M> DebugEvery<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Wraps `inner`, firing only when the iteration is a positive multiple
    /// of `every`.
    pub fn new(inner: Box<dyn DebugAction<T, M>>, every: usize) -> Self {
        Self {
            inner,
            every: every.max(1),
        }
    }
}

impl<T, M> DebugAction<T, M> for DebugEvery<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn act(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: i64,
    ) -> SolverResult<()> {
        if iteration < 0 {
            return self.inner.act(problem, state, iteration);
        }
        if iteration > 0 && iteration as usize % self.every == 0 {
            return self.inner.act(problem, state, iteration);
        }
        Ok(())
    }
}

/// State decorator that runs debug actions at the driver hooks.
#[derive(Debug)]
pub struct DebugSolverState<T, M, S>
where
    T: Scalar,
    M: Manifold<T>,
    S: Solver<T, M>,
{
    state: S,
    actions: HashMap<Hook, Box<dyn DebugAction<T, M>>>,
}

impl<T, M, S> DebugSolverState<T, M, S>
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
    /// [`DebugGroup`] to attach several.
    pub fn with(mut self, hook: Hook, action: Box<dyn DebugAction<T, M>>) -> Self {
        self.actions.insert(hook, action);
        self
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
            action.act(problem, &self.state, iteration)?;
        }
        Ok(())
    }
}

impl<T, M, S> SolverState<T, M> for DebugSolverState<T, M, S>
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

impl<T, M, S> Solver<T, M> for DebugSolverState<T, M, S>
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

    type Action = Box<dyn DebugAction<f64, TestEuclideanManifold>>;

    fn drain(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn test_debug_group_writes_one_line_per_iteration() {
        let problem = quadratic_problem(1);
        let state = TestState::new(
            DVector::from_vec(vec![3.0]),
            DVector::from_vec(vec![3.0]),
        );
        let (sink, buffer) = DebugSink::buffer();

        let mut group = DebugGroup::new(
            vec![
                Box::new(DebugIteration::new(sink.clone())) as Action,
                Box::new(DebugCost::new(sink.clone())) as Action,
            ],
            sink,
        );
        group.act(&problem, &state, 1).unwrap();
        group.act(&problem, &state, 2).unwrap();

        let output = drain(&buffer);
        assert_eq!(output, "# 1 f(x): 4.5 \n# 2 f(x): 4.5 \n");
    }

    #[test]
    fn test_debug_every_subsamples() {
        let problem = quadratic_problem(1);
        let state = TestState::new(
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![1.0]),
        );
        let (sink, buffer) = DebugSink::buffer();

        let mut action = DebugEvery::new(
            Box::new(DebugIteration::new(sink)) as Action,
            3,
        );
        for i in 0..=7 {
            action.act(&problem, &state, i).unwrap();
        }
        assert_eq!(drain(&buffer), "# 3 # 6 ");
    }

    #[test]
    fn test_debug_change_needs_a_snapshot_first() {
        let problem = quadratic_problem(1);
        let (sink, buffer) = DebugSink::buffer();
        let mut action = DebugChange::<f64, TestEuclideanManifold>::new(sink);

        let a = TestState::new(DVector::from_vec(vec![1.0]), DVector::from_vec(vec![1.0]));
        let b = TestState::new(DVector::from_vec(vec![4.0]), DVector::from_vec(vec![4.0]));

        action.act(&problem, &a, 1).unwrap();
        assert_eq!(drain(&buffer), "");
        action.act(&problem, &b, 2).unwrap();
        assert_eq!(drain(&buffer), "|Δp|: 3 ");
    }

    #[test]
    fn test_stopping_reason_is_quiet_without_reason() {
        let problem = quadratic_problem(1);
        let state = TestState::new(
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![1.0]),
        );
        let (sink, buffer) = DebugSink::buffer();
        let mut action = DebugStoppingReason::new(sink);

        DebugAction::<f64, TestEuclideanManifold>::act(&mut action, &problem, &state, 5).unwrap();
        assert_eq!(drain(&buffer), "");
    }
}
