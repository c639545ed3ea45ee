//! Composable stopping criteria.
//!
//! A stopping criterion is a predicate evaluated once per driver iteration
//! with the problem, the state and the iteration count. Criteria carry two
//! observable side effects: a human-readable `reason` (empty while not
//! triggered) and the iteration at which they fired. A check at iteration
//! zero resets both.
//!
//! Criteria compose through [`StopWhenAll`] and [`StopWhenAny`]. Combinators
//! evaluate *every* child on every call before combining the results, so
//! stateful children (timers, change trackers) stay live, and they flatten
//! on construction for readable reasons.

use crate::core::{
    error::SolverResult,
    manifold::{InverseRetractionMethod, Manifold, VectorTransportMethod},
    problem::OptimizationProblem,
    types::Scalar,
};
use crate::optimization::solver::SolverState;
use crate::optimization::storage::{self, StoreStateAction};
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// A typed value handed to [`StoppingCriterion::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CriterionValue<T> {
    /// An iteration-like count.
    Count(usize),
    /// A scalar threshold.
    Scalar(T),
    /// A wall-clock duration.
    Time(Duration),
}

/// Composable stopping predicate.
///
/// Implementations must reset `reason` and `at_iteration` when checked with
/// `iteration == 0` and keep both once triggered until the next reset.
pub trait StoppingCriterion<T, M>: Debug
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Evaluates the criterion. Returns `true` when the solver should stop.
    fn check(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: usize,
    ) -> SolverResult<bool>;

    /// The reason the criterion triggered; empty otherwise.
    fn reason(&self) -> String;

    /// The iteration at which the criterion triggered (zero after a reset).
    fn at_iteration(&self) -> usize;

    /// One-line description of what the criterion watches.
    fn summary(&self) -> String;

    /// Whether triggering semantically means "near a stationary point".
    fn indicates_convergence(&self) -> bool {
        false
    }

    /// Symbol-dispatched parameter update; walks into combinators and is
    /// silently ignored by leaves that do not recognize `key`.
    fn update(&mut self, _key: &str, _value: CriterionValue<T>) {}

    /// The flat list of leaf criteria whose reason is non-empty.
    fn active_criteria(&self) -> Vec<&dyn StoppingCriterion<T, M>>;
}

/// Stops after a fixed number of iterations.
#[derive(Debug, Clone)]
pub struct StopAfterIteration {
    max_iterations: usize,
    reason: String,
    at_iteration: usize,
}

impl StopAfterIteration {
    /// Stops as soon as the iteration count reaches `max_iterations`.
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            reason: String::new(),
            at_iteration: 0,
        }
    }

    /// Boxes the criterion.
    pub fn boxed<T, M>(self) -> Box<dyn StoppingCriterion<T, M>>
    where
        T: Scalar,
        M: Manifold<T>,
    {
        Box::new(self)
    }
}

impl<T, M> StoppingCriterion<T, M> for StopAfterIteration
where
    T: Scalar,
    M: Manifold<T>,
{
    fn check(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        _state: &dyn SolverState<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        if iteration == 0 {
            self.reason.clear();
            self.at_iteration = 0;
        }
        if iteration >= self.max_iterations {
            self.reason = format!(
                "At iteration {} the solver reached its maximal number of iterations ({}).",
                iteration, self.max_iterations
            );
            self.at_iteration = iteration;
            return Ok(true);
        }
        Ok(false)
    }

    fn reason(&self) -> String {
        self.reason.clone()
    }

    fn at_iteration(&self) -> usize {
        self.at_iteration
    }

    fn summary(&self) -> String {
        format!("stop after {} iterations", self.max_iterations)
    }

    fn update(&mut self, key: &str, value: CriterionValue<T>) {
        if let ("MaxIteration", CriterionValue::Count(n)) = (key, value) {
            self.max_iterations = n;
        }
    }

    fn active_criteria(&self) -> Vec<&dyn StoppingCriterion<T, M>> {
        if self.reason.is_empty() {
            Vec::new()
        } else {
            vec![self]
        }
    }
}

/// Stops once the wall clock since the first check exceeds a limit.
///
/// The time source is a plain function pointer so tests can inject a fake
/// clock.
#[derive(Debug, Clone)]
pub struct StopAfter {
    limit: Duration,
    start: Option<Instant>,
    clock: fn() -> Instant,
    reason: String,
    at_iteration: usize,
}

impl StopAfter {
    /// Stops once `limit` of wall-clock time has elapsed.
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            start: None,
            clock: Instant::now,
            reason: String::new(),
            at_iteration: 0,
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: fn() -> Instant) -> Self {
        self.clock = clock;
        self
    }

    /// Boxes the criterion.
    pub fn boxed<T, M>(self) -> Box<dyn StoppingCriterion<T, M>>
    where
        T: Scalar,
        M: Manifold<T>,
    {
        Box::new(self)
    }
}

impl<T, M> StoppingCriterion<T, M> for StopAfter
where
    T: Scalar,
    M: Manifold<T>,
{
    fn check(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        _state: &dyn SolverState<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        if iteration == 0 {
            self.reason.clear();
            self.at_iteration = 0;
            self.start = Some((self.clock)());
        }
        let start = *self.start.get_or_insert_with(self.clock);
        let elapsed = (self.clock)().saturating_duration_since(start);
        if elapsed >= self.limit {
            self.reason = format!(
                "The algorithm ran for {:?} (limit: {:?}).",
                elapsed, self.limit
            );
            self.at_iteration = iteration;
            return Ok(true);
        }
        Ok(false)
    }

    fn reason(&self) -> String {
        self.reason.clone()
    }

    fn at_iteration(&self) -> usize {
        self.at_iteration
    }

    fn summary(&self) -> String {
        format!("stop after {:?} of runtime", self.limit)
    }

    fn update(&mut self, key: &str, value: CriterionValue<T>) {
        if let ("MaxTime", CriterionValue::Time(limit)) = (key, value) {
            self.limit = limit;
        }
    }

    fn active_criteria(&self) -> Vec<&dyn StoppingCriterion<T, M>> {
        if self.reason.is_empty() {
            Vec::new()
        } else {
            vec![self]
        }
    }
}

/// Stops once the cost falls below a threshold.
#[derive(Debug, Clone)]
pub struct StopWhenCostLess<T> {
    threshold: T,
    reason: String,
    at_iteration: usize,
}

impl<T: Scalar> StopWhenCostLess<T> {
    /// Stops once `f(p) < threshold`.
    pub fn new(threshold: T) -> Self {
        Self {
            threshold,
            reason: String::new(),
            at_iteration: 0,
        }
    }

    /// Boxes the criterion.
    pub fn boxed<M: Manifold<T>>(self) -> Box<dyn StoppingCriterion<T, M>> {
        Box::new(self)
    }
}

impl<T, M> StoppingCriterion<T, M> for StopWhenCostLess<T>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn check(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        if iteration == 0 {
            self.reason.clear();
            self.at_iteration = 0;
            return Ok(false);
        }
        let cost = problem.cost(state.iterate())?;
        if cost < self.threshold {
            self.reason = format!(
                "The cost {} fell below the threshold {}.",
                cost, self.threshold
            );
            self.at_iteration = iteration;
            return Ok(true);
        }
        Ok(false)
    }

    fn reason(&self) -> String {
        self.reason.clone()
    }

    fn at_iteration(&self) -> usize {
        self.at_iteration
    }

    fn summary(&self) -> String {
        format!("stop when the cost is less than {}", self.threshold)
    }

    fn update(&mut self, key: &str, value: CriterionValue<T>) {
        if let ("MinCost", CriterionValue::Scalar(threshold)) = (key, value) {
            self.threshold = threshold;
        }
    }

    fn active_criteria(&self) -> Vec<&dyn StoppingCriterion<T, M>> {
        if self.reason.is_empty() {
            Vec::new()
        } else {
            vec![self]
        }
    }
}

/// Stops once the Riemannian gradient norm falls below a threshold.
///
/// This is the standard first-order stationarity test; triggering indicates
/// convergence.
#[derive(Debug, Clone)]
pub struct StopWhenGradientNormLess<T> {
    threshold: T,
    reason: String,
    at_iteration: usize,
}

impl<T: Scalar> StopWhenGradientNormLess<T> {
    /// Stops once `||grad f(p)|| < threshold`.
    pub fn new(threshold: T) -> Self {
        Self {
            threshold,
            reason: String::new(),
            at_iteration: 0,
        }
    }

    /// Boxes the criterion.
    pub fn boxed<M: Manifold<T>>(self) -> Box<dyn StoppingCriterion<T, M>> {
        Box::new(self)
    }
}

impl<T, M> StoppingCriterion<T, M> for StopWhenGradientNormLess<T>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn check(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        if iteration == 0 {
            self.reason.clear();
            self.at_iteration = 0;
            return Ok(false);
        }
        let norm = problem
            .manifold()
            .norm(state.iterate(), state.gradient())?;
        if norm < self.threshold {
            self.reason = format!(
                "The gradient norm {} is below the threshold {}.",
                norm, self.threshold
            );
            self.at_iteration = iteration;
            return Ok(true);
        }
        Ok(false)
    }

    fn reason(&self) -> String {
        self.reason.clone()
    }

    fn at_iteration(&self) -> usize {
        self.at_iteration
    }

    fn summary(&self) -> String {
        format!("stop when the gradient norm is less than {}", self.threshold)
    }

    fn indicates_convergence(&self) -> bool {
        true
    }

    fn update(&mut self, key: &str, value: CriterionValue<T>) {
        if let ("MinGradNorm", CriterionValue::Scalar(threshold)) = (key, value) {
            self.threshold = threshold;
        }
    }

    fn active_criteria(&self) -> Vec<&dyn StoppingCriterion<T, M>> {
        if self.reason.is_empty() {
            Vec::new()
        } else {
            vec![self]
        }
    }
}

/// Stops once the distance between successive iterates falls below a
/// threshold.
///
/// The criterion owns its snapshot storage and updates it *after* the
/// comparison, so it can never fire on the first iteration.
#[derive(Debug, Clone)]
pub struct StopWhenChangeLess<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    threshold: T,
    storage: StoreStateAction<T, M>,
    inverse_retraction: Option<InverseRetractionMethod>,
    reason: String,
    at_iteration: usize,
}

impl<T, M> StopWhenChangeLess<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Stops once `d(p_old, p) < threshold`.
    pub fn new(threshold: T) -> Self {
        Self {
            threshold,
            storage: StoreStateAction::new(),
            inverse_retraction: None,
            reason: String::new(),
            at_iteration: 0,
        }
    }

    /// Overrides the inverse retraction used for the distance computation.
    pub fn with_inverse_retraction(mut self, method: InverseRetractionMethod) -> Self {
        self.inverse_retraction = Some(method);
        self
    }

    /// Boxes the criterion.
    pub fn boxed(self) -> Box<dyn StoppingCriterion<T, M>>
    where
        M: 'static,
    {
        Box::new(self)
    }

    fn change(&self, manifold: &M, old: &M::Point, current: &M::Point) -> SolverResult<T> {
        match self.inverse_retraction {
            None => Ok(manifold.distance(old, current)?),
            Some(method) => {
                let mut log = manifold.zero_tangent(old);
                manifold.inverse_retract(old, current, method, &mut log)?;
                Ok(manifold.norm(old, &log)?)
            }
        }
    }
}

impl<T, M> StoppingCriterion<T, M> for StopWhenChangeLess<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn check(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        if iteration == 0 {
            self.reason.clear();
            self.at_iteration = 0;
            self.storage.reset();
            return Ok(false);
        }
        let manifold = problem.manifold();
        let mut triggered = false;
        if let Some(old) = self.storage.point(storage::ITERATE) {
            let change = self.change(manifold, old, state.iterate())?;
            if change < self.threshold {
                self.reason = format!(
                    "The iterate change {} is below the threshold {}.",
                    change, self.threshold
                );
                self.at_iteration = iteration;
                triggered = true;
            }
        }
        // Snapshot update happens after the comparison, so the first
        // iteration has no prior value to compare against.
        self.storage.store_point(storage::ITERATE, state.iterate());
        Ok(triggered)
    }

    fn reason(&self) -> String {
        self.reason.clone()
    }

    fn at_iteration(&self) -> usize {
        self.at_iteration
    }

    fn summary(&self) -> String {
        format!("stop when the iterate change is less than {}", self.threshold)
    }

    fn indicates_convergence(&self) -> bool {
        true
    }

    fn update(&mut self, key: &str, value: CriterionValue<T>) {
        if let ("MinIterateChange", CriterionValue::Scalar(threshold)) = (key, value) {
            self.threshold = threshold;
        }
    }

    fn active_criteria(&self) -> Vec<&dyn StoppingCriterion<T, M>> {
        if self.reason.is_empty() {
            Vec::new()
        } else {
            vec![self]
        }
    }
}

/// Stops once the change of the gradient, transported to a common tangent
/// space, falls below a threshold.
#[derive(Debug, Clone)]
pub struct StopWhenGradientChangeLess<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    threshold: T,
    storage: StoreStateAction<T, M>,
    vector_transport: Option<VectorTransportMethod>,
    reason: String,
    at_iteration: usize,
}

impl<T, M> StopWhenGradientChangeLess<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Stops once `||T_{p_old -> p}(X_old) - X|| < threshold`.
    pub fn new(threshold: T) -> Self {
        Self {
            threshold,
            storage: StoreStateAction::new(),
            vector_transport: None,
            reason: String::new(),
            at_iteration: 0,
        }
    }

    /// Overrides the vector transport used for the comparison.
    pub fn with_vector_transport(mut self, method: VectorTransportMethod) -> Self {
        self.vector_transport = Some(method);
        self
    }

    /// Boxes the criterion.
    pub fn boxed(self) -> Box<dyn StoppingCriterion<T, M>>
    where
        M: 'static,
    {
        Box::new(self)
    }
}

impl<T, M> StoppingCriterion<T, M> for StopWhenGradientChangeLess<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn check(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        if iteration == 0 {
            self.reason.clear();
            self.at_iteration = 0;
            self.storage.reset();
            return Ok(false);
        }
        let manifold = problem.manifold();
        let point = state.iterate();
        let gradient = state.gradient();
        let mut triggered = false;
        if let (Some(old_point), Some(old_gradient)) = (
            self.storage.point(storage::ITERATE),
            self.storage.tangent(storage::GRADIENT),
        ) {
            let method = self
                .vector_transport
                .unwrap_or_else(|| manifold.default_vector_transport());
            let mut transported = manifold.zero_tangent(point);
            manifold.vector_transport(old_point, point, old_gradient, method, &mut transported)?;
            let mut negated = manifold.zero_tangent(point);
            manifold.scale_tangent(point, -T::one(), gradient, &mut negated)?;
            let mut difference = manifold.zero_tangent(point);
            manifold.add_tangents(point, &transported, &negated, &mut difference)?;
            let change = manifold.norm(point, &difference)?;
            if change < self.threshold {
                self.reason = format!(
                    "The gradient change {} is below the threshold {}.",
                    change, self.threshold
                );
                self.at_iteration = iteration;
                triggered = true;
            }
        }
        self.storage.store_point(storage::ITERATE, point);
        self.storage.store_tangent(storage::GRADIENT, gradient);
        Ok(triggered)
    }

    fn reason(&self) -> String {
        self.reason.clone()
    }

    fn at_iteration(&self) -> usize {
        self.at_iteration
    }

    fn summary(&self) -> String {
        format!("stop when the gradient change is less than {}", self.threshold)
    }

    fn update(&mut self, key: &str, value: CriterionValue<T>) {
        if let ("MinGradientChange", CriterionValue::Scalar(threshold)) = (key, value) {
            self.threshold = threshold;
        }
    }

    fn active_criteria(&self) -> Vec<&dyn StoppingCriterion<T, M>> {
        if self.reason.is_empty() {
            Vec::new()
        } else {
            vec![self]
        }
    }
}

/// Stops once the most recent stepsize falls below a threshold.
#[derive(Debug, Clone)]
pub struct StopWhenStepsizeLess<T> {
    threshold: T,
    reason: String,
    at_iteration: usize,
}

impl<T: Scalar> StopWhenStepsizeLess<T> {
    /// Stops once the last stepsize is smaller than `threshold`.
    pub fn new(threshold: T) -> Self {
        Self {
            threshold,
            reason: String::new(),
            at_iteration: 0,
        }
    }

    /// Boxes the criterion.
    pub fn boxed<M: Manifold<T>>(self) -> Box<dyn StoppingCriterion<T, M>> {
        Box::new(self)
    }
}

impl<T, M> StoppingCriterion<T, M> for StopWhenStepsizeLess<T>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn check(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        if iteration == 0 {
            self.reason.clear();
            self.at_iteration = 0;
            return Ok(false);
        }
        let stepsize = state.last_stepsize();
        if stepsize < self.threshold {
            self.reason = format!(
                "The stepsize {} is below the threshold {}.",
                stepsize, self.threshold
            );
            self.at_iteration = iteration;
            return Ok(true);
        }
        Ok(false)
    }

    fn reason(&self) -> String {
        self.reason.clone()
    }

    fn at_iteration(&self) -> usize {
        self.at_iteration
    }

    fn summary(&self) -> String {
        format!("stop when the stepsize is less than {}", self.threshold)
    }

    fn update(&mut self, key: &str, value: CriterionValue<T>) {
        if let ("MinStepsize", CriterionValue::Scalar(threshold)) = (key, value) {
            self.threshold = threshold;
        }
    }

    fn active_criteria(&self) -> Vec<&dyn StoppingCriterion<T, M>> {
        if self.reason.is_empty() {
            Vec::new()
        } else {
            vec![self]
        }
    }
}

/// Stops once a named scalar field of the state is smaller than or equal to
/// a value.
#[derive(Debug, Clone)]
pub struct StopWhenSmallerOrEqual<T> {
    field: String,
    threshold: T,
    reason: String,
    at_iteration: usize,
}

impl<T: Scalar> StopWhenSmallerOrEqual<T> {
    /// Stops once `state.scalar_field(field) <= threshold`.
    pub fn new<S: Into<String>>(field: S, threshold: T) -> Self {
        Self {
            field: field.into(),
            threshold,
            reason: String::new(),
            at_iteration: 0,
        }
    }

    /// Boxes the criterion.
    pub fn boxed<M: Manifold<T>>(self) -> Box<dyn StoppingCriterion<T, M>> {
        Box::new(self)
    }
}

impl<T, M> StoppingCriterion<T, M> for StopWhenSmallerOrEqual<T>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn check(
        &mut self,
        _problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        if iteration == 0 {
            self.reason.clear();
            self.at_iteration = 0;
            return Ok(false);
        }
        if let Some(value) = state.scalar_field(&self.field) {
            if value <= self.threshold {
                self.reason = format!(
                    "The field {} ({}) is smaller than or equal to {}.",
                    self.field, value, self.threshold
                );
                self.at_iteration = iteration;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn reason(&self) -> String {
        self.reason.clone()
    }

    fn at_iteration(&self) -> usize {
        self.at_iteration
    }

    fn summary(&self) -> String {
        format!(
            "stop when the field {} is smaller than or equal to {}",
            self.field, self.threshold
        )
    }

    fn active_criteria(&self) -> Vec<&dyn StoppingCriterion<T, M>> {
        if self.reason.is_empty() {
            Vec::new()
        } else {
            vec![self]
        }
    }
}

/// Conjunction: triggers when every child triggers at the same check.
#[derive(Debug)]
pub struct StopWhenAll<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    criteria: Vec<Box<dyn StoppingCriterion<T, M>>>,
    reason: String,
    at_iteration: usize,
}

impl<T, M> StopWhenAll<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Combines criteria under "and".
    pub fn new(criteria: Vec<Box<dyn StoppingCriterion<T, M>>>) -> Self {
        Self {
            criteria,
            reason: String::new(),
            at_iteration: 0,
        }
    }

    /// Appends another criterion, flattening into this conjunction.
    pub fn and(mut self, criterion: Box<dyn StoppingCriterion<T, M>>) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Boxes the combinator.
    pub fn boxed(self) -> Box<dyn StoppingCriterion<T, M>>
    where
        M: 'static,
    {
        Box::new(self)
    }
}

impl<T, M> StoppingCriterion<T, M> for StopWhenAll<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn check(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        if iteration == 0 {
            self.reason.clear();
            self.at_iteration = 0;
        }
        // Every child is evaluated before combining so stateful children
        // stay live.
        let mut all = true;
        for criterion in &mut self.criteria {
            let triggered = criterion.check(problem, state, iteration)?;
            all = all && triggered;
        }
        if all {
            self.reason = self
                .criteria
                .iter()
                .map(|criterion| criterion.reason())
                .collect::<Vec<_>>()
                .join(" ");
            self.at_iteration = iteration;
            return Ok(true);
        }
        Ok(false)
    }

    fn reason(&self) -> String {
        self.reason.clone()
    }

    fn at_iteration(&self) -> usize {
        self.at_iteration
    }

    fn summary(&self) -> String {
        let inner = self
            .criteria
            .iter()
            .map(|criterion| criterion.summary())
            .collect::<Vec<_>>()
            .join(", ");
        format!("all of [{}]", inner)
    }

    fn indicates_convergence(&self) -> bool {
        // One convergence witness among the children suffices.
        self.criteria
            .iter()
            .any(|criterion| criterion.indicates_convergence())
    }

    fn update(&mut self, key: &str, value: CriterionValue<T>) {
        for criterion in &mut self.criteria {
            criterion.update(key, value);
        }
    }

    fn active_criteria(&self) -> Vec<&dyn StoppingCriterion<T, M>> {
        self.criteria
            .iter()
            .flat_map(|criterion| criterion.active_criteria())
            .collect()
    }
}

/// Disjunction: triggers when any child triggers.
#[derive(Debug)]
pub struct StopWhenAny<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    criteria: Vec<Box<dyn StoppingCriterion<T, M>>>,
    reason: String,
    at_iteration: usize,
}

impl<T, M> StopWhenAny<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Combines criteria under "or".
    pub fn new(criteria: Vec<Box<dyn StoppingCriterion<T, M>>>) -> Self {
        Self {
            criteria,
            reason: String::new(),
            at_iteration: 0,
        }
    }

    /// Appends another criterion, flattening into this disjunction.
    pub fn or(mut self, criterion: Box<dyn StoppingCriterion<T, M>>) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Boxes the combinator.
    pub fn boxed(self) -> Box<dyn StoppingCriterion<T, M>>
    where
        M: 'static,
    {
        Box::new(self)
    }
}

impl<T, M> StoppingCriterion<T, M> for StopWhenAny<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn check(
        &mut self,
        problem: &dyn OptimizationProblem<T, M>,
        state: &dyn SolverState<T, M>,
        iteration: usize,
    ) -> SolverResult<bool> {
        if iteration == 0 {
            self.reason.clear();
            self.at_iteration = 0;
        }
        let mut any = false;
        for criterion in &mut self.criteria {
            let triggered = criterion.check(problem, state, iteration)?;
            any = any || triggered;
        }
        if any {
            self.reason = self
                .criteria
                .iter()
                .map(|criterion| criterion.reason())
                .filter(|reason| !reason.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            self.at_iteration = iteration;
            return Ok(true);
        }
        Ok(false)
    }

    fn reason(&self) -> String {
        self.reason.clone()
    }

    fn at_iteration(&self) -> usize {
        self.at_iteration
    }

    fn summary(&self) -> String {
        let inner = self
            .criteria
            .iter()
            .map(|criterion| criterion.summary())
            .collect::<Vec<_>>()
            .join(", ");
        format!("any of [{}]", inner)
    }

    fn indicates_convergence(&self) -> bool {
        // Judged over the children that actually fired.
        self.criteria
            .iter()
            .filter(|criterion| !criterion.reason().is_empty())
            .any(|criterion| criterion.indicates_convergence())
    }

    fn update(&mut self, key: &str, value: CriterionValue<T>) {
        for criterion in &mut self.criteria {
            criterion.update(key, value);
        }
    }

    fn active_criteria(&self) -> Vec<&dyn StoppingCriterion<T, M>> {
        self.criteria
            .iter()
            .flat_map(|criterion| criterion.active_criteria())
            .collect()
    }
}
