//! Core traits and types for optimization on Riemannian manifolds.
//!
//! This crate provides the solver engine for unconstrained minimization
//! `argmin f(p)` where `p` lives on a smooth manifold. The engine only ever
//! touches manifolds through the capability trait in
//! [`core::manifold`], so the same solvers run on spheres, product
//! manifolds and user-defined manifolds.
//!
//! # Key Concepts
//!
//! - **Manifolds**: smooth spaces accessed through retraction, inverse
//!   retraction, vector transport, metric and gradient conversion
//! - **Objectives and problems**: user callables bound to a manifold,
//!   optionally wrapped by counting and caching decorators
//! - **Solver states**: per-algorithm mutable data behind a common
//!   polymorphic surface, optionally wrapped by debug and record decorators
//! - **Stopping criteria**: composable predicates with an and/or algebra
//!
//! # Modules
//!
//! - [`core`]: scalars, errors, the manifold capability, objectives,
//!   problems
//! - [`optimization`]: the driver loop, stepsize rules, stopping criteria,
//!   storage actions and the decorators

pub mod core;
pub mod optimization;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used items at the crate root.
pub use crate::core::error::{ManifoldError, Result, SolverError, SolverResult};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use geomopt_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::cached_objective::{ContentKey, LruCacheObjective, SimpleCacheObjective};
    pub use crate::core::error::{ManifoldError, Result, SolverError, SolverResult};
    pub use crate::core::manifold::{
        InverseRetractionMethod, Manifold, RetractionMethod, VectorTransportMethod,
    };
    pub use crate::core::objective::{
        CountingObjective, GradientObjective, Objective, ProximalObjective,
    };
    pub use crate::core::problem::{OptimizationProblem, Problem};
    pub use crate::core::types::{DVector, Scalar};
    pub use crate::optimization::debug::{
        DebugAction, DebugChange, DebugCost, DebugDivider, DebugEvery, DebugGradientNorm,
        DebugGroup, DebugIteration, DebugSink, DebugSolverState, DebugStepsize,
        DebugStoppingReason,
    };
    pub use crate::optimization::record::{
        RecordAction, RecordChange, RecordCost, RecordEvery, RecordGradient,
        RecordGradientNorm, RecordGroup, RecordIteration, RecordSolverState, RecordedValue,
    };
    pub use crate::optimization::solver::{
        get_solver_result, solve, Hook, Solver, SolverState,
    };
    pub use crate::optimization::stepsize::{
        ArmijoLinesearch, ConstantStepsize, DecreasingStepsize, Stepsize,
    };
    pub use crate::optimization::stopping_criterion::{
        CriterionValue, StopAfter, StopAfterIteration, StopWhenAll, StopWhenAny,
        StopWhenChangeLess, StopWhenCostLess, StopWhenGradientChangeLess,
        StopWhenGradientNormLess, StopWhenSmallerOrEqual, StopWhenStepsizeLess,
        StoppingCriterion,
    };
    pub use crate::optimization::storage::StoreStateAction;
}
