//! Riemannian gradient descent.
//!
//! Given a smooth cost f on a manifold M, gradient descent iterates
//!
//! ```text
//! 1. X_k = grad f(p_k)
//! 2. d_k = direction update (default: -X_k)
//! 3. t_k = stepsize rule
//! 4. p_{k+1} = R_{p_k}(t_k d_k)
//! ```
//!
//! where R is a retraction. The state realizes the engine's solver
//! contract; the convenience functions at the bottom assemble the full
//! decorated pipeline from an options bag.

use geomopt_core::core::{
    cached_objective::{ContentKey, LruCacheObjective, SimpleCacheObjective},
    error::SolverResult,
    manifold::{Manifold, RetractionMethod},
    objective::{CountingObjective, GradientObjective, Objective},
    problem::{OptimizationProblem, Problem},
    types::Scalar,
};
use geomopt_core::optimization::{
    debug::{
        DebugAction, DebugChange, DebugCost, DebugDivider, DebugEvery, DebugGradientNorm,
        DebugGroup, DebugIteration, DebugSink, DebugSolverState, DebugStepsize,
        DebugStoppingReason,
    },
    record::{
        RecordAction, RecordChange, RecordCost, RecordEvery, RecordGradient,
        RecordGradientNorm, RecordGroup, RecordIteration, RecordSolverState,
    },
    solver::{get_solver_result, solve, Hook, Solver, SolverState},
    stepsize::{ArmijoLinesearch, Stepsize},
    stopping_criterion::{
        StopAfterIteration, StopWhenAny, StopWhenGradientNormLess, StoppingCriterion,
    },
};
use std::fmt::Debug;

/// Turns the current gradient into a search direction.
pub trait DirectionUpdate<T, M>: Debug
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    /// Writes the search direction for the given gradient into `result`.
    fn compute(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        point: &M::Point,
        gradient: &M::TangentVector,
        iteration: usize,
        result: &mut M::TangentVector,
    ) -> SolverResult<()>;
}

/// The default direction update d = -grad f(p).
#[derive(Debug, Clone, Copy, Default)]
pub struct SteepestDescent;

impl<T, M> DirectionUpdate<T, M> for SteepestDescent
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    fn compute(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        point: &M::Point,
        gradient: &M::TangentVector,
        _iteration: usize,
        result: &mut M::TangentVector,
    ) -> SolverResult<()> {
        problem
            .manifold()
            .scale_tangent(point, -T::one(), gradient, result)?;
        Ok(())
    }
}

/// State of the Riemannian gradient descent solver.
#[derive(Debug)]
pub struct GradientDescentState<T, M>
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    iterate: M::Point,
    gradient: M::TangentVector,
    direction: M::TangentVector,
    stepsize_rule: Box<dyn Stepsize<T, M>>,
    direction_update: Box<dyn DirectionUpdate<T, M>>,
    stopping_criterion: Option<Box<dyn StoppingCriterion<T, M>>>,
    retraction: Option<RetractionMethod>,
    last_stepsize: T,
}

impl<T, M> GradientDescentState<T, M>
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    /// Creates a state at `initial_point` with Armijo backtracking and the
    /// default stopping criterion (200 iterations or small gradient norm).
    pub fn new(manifold: &M, initial_point: M::Point) -> Self {
        let gradient = manifold.zero_tangent(&initial_point);
        let direction = gradient.clone();
        let stop: Box<dyn StoppingCriterion<T, M>> = StopWhenAny::new(vec![
            StopAfterIteration::new(200).boxed(),
            StopWhenGradientNormLess::new(T::DEFAULT_GRADIENT_TOLERANCE).boxed(),
        ])
        .boxed();
        Self {
            iterate: initial_point,
            gradient,
            direction,
            stepsize_rule: Box::new(ArmijoLinesearch::default()),
            direction_update: Box::new(SteepestDescent),
            stopping_criterion: Some(stop),
            retraction: None,
            last_stepsize: num_traits::Float::infinity(),
        }
    }

    /// Replaces the stepsize rule.
    pub fn with_stepsize(mut self, rule: Box<dyn Stepsize<T, M>>) -> Self {
        self.stepsize_rule = rule;
        self
    }

    /// Replaces the stopping criterion.
    pub fn with_stopping_criterion(mut self, criterion: Box<dyn StoppingCriterion<T, M>>) -> Self {
        self.stopping_criterion = Some(criterion);
        self
    }

    /// Replaces the direction update.
    pub fn with_direction_update(mut self, update: Box<dyn DirectionUpdate<T, M>>) -> Self {
        self.direction_update = update;
        self
    }

    /// Overrides the manifold's default retraction.
    pub fn with_retraction(mut self, method: RetractionMethod) -> Self {
        self.retraction = Some(method);
        self
    }
}

impl<T, M> SolverState<T, M> for GradientDescentState<T, M>
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

    fn last_stepsize(&self) -> T {
        self.last_stepsize
    }

    fn scalar_field(&self, name: &str) -> Option<T> {
        match name {
            "stepsize" => Some(self.last_stepsize),
            _ => None,
        }
    }

    fn stopping_criterion(&self) -> Option<&dyn StoppingCriterion<T, M>> {
        self.stopping_criterion.as_deref()
    }
}

impl<T, M> Solver<T, M> for GradientDescentState<T, M>
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    fn initialize(&mut self, problem: &dyn OptimizationProblem<T, M>) -> SolverResult<()> {
        problem.gradient_in_place(&self.iterate, &mut self.gradient)?;
        self.last_stepsize = num_traits::Float::infinity();
        Ok(())
    }

    fn step(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        iteration: usize,
    ) -> SolverResult<()> {
        problem.gradient_in_place(&self.iterate, &mut self.gradient)?;
        self.direction_update.compute(
            problem,
            &self.iterate,
            &self.gradient,
            iteration,
            &mut self.direction,
        )?;
        let stepsize = self.stepsize_rule.compute(
            problem,
            &self.iterate,
            &self.gradient,
            &self.direction,
            iteration,
        )?;
        self.last_stepsize = stepsize;

        let manifold = problem.manifold();
        let retraction = self
            .retraction
            .unwrap_or_else(|| manifold.default_retraction());
        let mut scaled = manifold.zero_tangent(&self.iterate);
        manifold.scale_tangent(&self.iterate, stepsize, &self.direction, &mut scaled)?;
        let mut next = self.iterate.clone();
        manifold.retract(&self.iterate, &scaled, retraction, &mut next)?;
        self.iterate = next;

        tracing::debug!(iteration, stepsize = stepsize.to_f64(), "gradient descent step");
        Ok(())
    }

    fn check_stop(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        // The criterion leaves the state while it inspects it; `None` can
        // only be observed during this call.
        let Some(mut criterion) = self.stopping_criterion.take() else {
            return Ok(false);
        };
        let stopped = criterion.check(problem, &*self, iteration);
        self.stopping_criterion = Some(criterion);
        stopped
    }
}

/// How the objective should be cached inside the options pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSpec {
    /// Remember the most recent evaluation point only.
    Simple,
    /// Keep up to the given number of entries, least recently used first.
    Lru(usize),
}

/// One entry of the `debug` option list.
#[derive(Debug, Clone)]
pub enum DebugSpec {
    /// Print the iteration number.
    Iteration,
    /// Print the cost.
    Cost,
    /// Print the gradient norm.
    GradientNorm,
    /// Print the stepsize.
    Stepsize,
    /// Print the iterate change.
    Change,
    /// Print a fixed text.
    Divider(String),
    /// Run the whole group only every k-th iteration.
    Every(usize),
    /// Print the stopping reason once the solver stops.
    StoppingReason,
}

/// One entry of the `record` option list.
#[derive(Debug, Clone)]
pub enum RecordSpec {
    /// Record the iteration number.
    Iteration,
    /// Record the cost.
    Cost,
    /// Record the gradient.
    Gradient,
    /// Record the gradient norm.
    GradientNorm,
    /// Record the iterate change.
    Change,
    /// Run the whole group only every k-th iteration.
    Every(usize),
}

/// Options of the high-level gradient descent entry points.
pub struct GradientDescentOptions<T, M>
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    /// Stepsize rule; Armijo backtracking when absent.
    pub stepsize: Option<Box<dyn Stepsize<T, M>>>,
    /// Stopping criterion; iteration cap or small gradient when absent.
    pub stopping_criterion: Option<Box<dyn StoppingCriterion<T, M>>>,
    /// Retraction override; the manifold's default when absent.
    pub retraction: Option<RetractionMethod>,
    /// Debug actions run at each iteration (and at stop).
    pub debug: Vec<DebugSpec>,
    /// Record actions run at each iteration.
    pub record: Vec<RecordSpec>,
    /// Sink for the debug output; stdout when absent.
    pub sink: Option<DebugSink>,
    /// Objective caching.
    pub cache: Option<CacheSpec>,
    /// Wrap the objective with evaluation counters.
    pub count: bool,
}

impl<T, M> Default for GradientDescentOptions<T, M>
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    fn default() -> Self {
        Self {
            stepsize: None,
            stopping_criterion: None,
            retraction: None,
            debug: Vec::new(),
            record: Vec::new(),
            sink: None,
            cache: None,
            count: false,
        }
    }
}

/// The fully decorated state returned by
/// [`gradient_descent_with_state`]; both decorator layers are transparent
/// when no actions were requested.
pub type DecoratedGradientDescentState<T, M> =
    RecordSolverState<T, M, DebugSolverState<T, M, GradientDescentState<T, M>>>;

fn build_debug_actions<T, M>(
    specs: &[DebugSpec],
    sink: &DebugSink,
) -> (Option<Box<dyn DebugAction<T, M>>>, Option<Box<dyn DebugAction<T, M>>>)
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    let mut atoms: Vec<Box<dyn DebugAction<T, M>>> = Vec::new();
    let mut every = None;
    let mut stop: Option<Box<dyn DebugAction<T, M>>> = None;
    for spec in specs {
        match spec {
            DebugSpec::Iteration => atoms.push(Box::new(DebugIteration::new(sink.clone()))),
            DebugSpec::Cost => atoms.push(Box::new(DebugCost::new(sink.clone()))),
            DebugSpec::GradientNorm => {
                atoms.push(Box::new(DebugGradientNorm::new(sink.clone())))
            }
            DebugSpec::Stepsize => atoms.push(Box::new(DebugStepsize::new(sink.clone()))),
            DebugSpec::Change => atoms.push(Box::new(DebugChange::new(sink.clone()))),
            DebugSpec::Divider(text) => {
                atoms.push(Box::new(DebugDivider::new(text.clone(), sink.clone())))
            }
            DebugSpec::Every(k) => every = Some(*k),
            DebugSpec::StoppingReason => {
                stop = Some(Box::new(DebugStoppingReason::new(sink.clone())))
            }
        }
    }
    let iteration = if atoms.is_empty() {
        None
    } else {
        let group: Box<dyn DebugAction<T, M>> = Box::new(DebugGroup::new(atoms, sink.clone()));
        Some(match every {
            // A bare number in the spec list subsamples the whole group.
            Some(k) => Box::new(DebugEvery::new(group, k)) as Box<dyn DebugAction<T, M>>,
            None => group,
        })
    };
    (iteration, stop)
}

fn build_record_action<T, M>(specs: &[RecordSpec]) -> Option<Box<dyn RecordAction<T, M>>>
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    let mut entries: Vec<(&'static str, Box<dyn RecordAction<T, M>>)> = Vec::new();
    let mut every = None;
    for spec in specs {
        match spec {
            RecordSpec::Iteration => {
                entries.push(("Iteration", Box::new(RecordIteration::new())))
            }
            RecordSpec::Cost => entries.push(("Cost", Box::new(RecordCost::new()))),
            RecordSpec::Gradient => {
                entries.push(("Gradient", Box::new(RecordGradient::new())))
            }
            RecordSpec::GradientNorm => {
                entries.push(("GradientNorm", Box::new(RecordGradientNorm::new())))
            }
            RecordSpec::Change => entries.push(("Change", Box::new(RecordChange::new()))),
            RecordSpec::Every(k) => every = Some(*k),
        }
    }
    if entries.is_empty() {
        return None;
    }
    let group: Box<dyn RecordAction<T, M>> = Box::new(RecordGroup::new(entries));
    Some(match every {
        Some(k) => Box::new(RecordEvery::new(group, k)) as Box<dyn RecordAction<T, M>>,
        None => group,
    })
}

fn build_state<T, M>(
    manifold: &M,
    initial_point: M::Point,
    stepsize: Option<Box<dyn Stepsize<T, M>>>,
    stopping_criterion: Option<Box<dyn StoppingCriterion<T, M>>>,
    retraction: Option<RetractionMethod>,
    debug: &[DebugSpec],
    record: &[RecordSpec],
    sink: DebugSink,
) -> DecoratedGradientDescentState<T, M>
where
    T: Scalar,
    M: Manifold<T> + 'static,
{
    let mut state = GradientDescentState::new(manifold, initial_point);
    if let Some(rule) = stepsize {
        state = state.with_stepsize(rule);
    }
    if let Some(criterion) = stopping_criterion {
        state = state.with_stopping_criterion(criterion);
    }
    if let Some(method) = retraction {
        state = state.with_retraction(method);
    }

    let (iteration_debug, stop_debug) = build_debug_actions(debug, &sink);
    let mut debugged = DebugSolverState::new(state);
    if let Some(action) = iteration_debug {
        debugged = debugged.with(Hook::Iteration, action);
    }
    if let Some(action) = stop_debug {
        debugged = debugged.with(Hook::Stop, action);
    }

    let mut recorded = RecordSolverState::new(debugged);
    if let Some(action) = build_record_action(record) {
        recorded = recorded.with(Hook::Iteration, action);
    }
    recorded
}

fn run_with<T, M, O, S>(manifold: M, objective: O, state: &mut S) -> SolverResult<()>
where
    T: Scalar,
    M: Manifold<T> + 'static,
    O: Objective<T, M>,
    S: Solver<T, M>,
{
    let problem = Problem::new(manifold, objective);
    solve(&problem, state)
}

/// Minimizes `cost` over `manifold` by gradient descent with default
/// options, returning the minimizer.
///
/// The `gradient` closure must return the Riemannian gradient at the query
/// point.
pub fn gradient_descent<T, M, F, G>(
    manifold: M,
    cost: F,
    gradient: G,
    initial_point: M::Point,
) -> SolverResult<M::Point>
where
    T: Scalar,
    M: Manifold<T> + 'static,
    F: Fn(&M, &M::Point) -> T,
    G: Fn(&M, &M::Point) -> M::TangentVector,
{
    let mut state = build_state(
        &manifold,
        initial_point,
        None,
        None,
        None,
        &[],
        &[],
        DebugSink::stdout(),
    );
    run_with(manifold, GradientObjective::new(cost, gradient), &mut state)?;
    Ok(get_solver_result(&state))
}

/// Gradient descent with an options bag, returning the minimizer.
pub fn gradient_descent_with_options<T, M, F, G>(
    manifold: M,
    cost: F,
    gradient: G,
    initial_point: M::Point,
    options: GradientDescentOptions<T, M>,
) -> SolverResult<M::Point>
where
    T: Scalar,
    M: Manifold<T> + 'static,
    M::Point: ContentKey,
    F: Fn(&M, &M::Point) -> T,
    G: Fn(&M, &M::Point) -> M::TangentVector,
{
    let state = gradient_descent_with_state(manifold, cost, gradient, initial_point, options)?;
    Ok(get_solver_result(&state))
}

/// Gradient descent with an options bag, returning the fully decorated
/// state for post-hoc inspection (records, stopping reason, iterate).
pub fn gradient_descent_with_state<T, M, F, G>(
    manifold: M,
    cost: F,
    gradient: G,
    initial_point: M::Point,
    options: GradientDescentOptions<T, M>,
) -> SolverResult<DecoratedGradientDescentState<T, M>>
where
    T: Scalar,
    M: Manifold<T> + 'static,
    M::Point: ContentKey,
    F: Fn(&M, &M::Point) -> T,
    G: Fn(&M, &M::Point) -> M::TangentVector,
{
    let GradientDescentOptions {
        stepsize,
        stopping_criterion,
        retraction,
        debug,
        record,
        sink,
        cache,
        count,
    } = options;

    let mut state = build_state(
        &manifold,
        initial_point,
        stepsize,
        stopping_criterion,
        retraction,
        &debug,
        &record,
        sink.unwrap_or_default(),
    );

    let objective = GradientObjective::new(cost, gradient);
    match (cache, count) {
        (None, false) => run_with(manifold, objective, &mut state)?,
        (None, true) => run_with(manifold, CountingObjective::new(objective), &mut state)?,
        (Some(CacheSpec::Simple), false) => {
            run_with(manifold, SimpleCacheObjective::new(objective), &mut state)?
        }
        (Some(CacheSpec::Simple), true) => run_with(
            manifold,
            SimpleCacheObjective::new(CountingObjective::new(objective)),
            &mut state,
        )?,
        (Some(CacheSpec::Lru(capacity)), false) => run_with(
            manifold,
            LruCacheObjective::new(objective, capacity),
            &mut state,
        )?,
        (Some(CacheSpec::Lru(capacity)), true) => run_with(
            manifold,
            LruCacheObjective::new(CountingObjective::new(objective), capacity),
            &mut state,
        )?,
    }
    Ok(state)
}
