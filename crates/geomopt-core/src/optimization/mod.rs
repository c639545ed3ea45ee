//! The solver engine: driver, stepsizes, stopping criteria, storage and the
//! debug / record decorators.

pub mod debug;
pub mod record;
pub mod solver;
pub mod stepsize;
pub mod stopping_criterion;
pub mod storage;

pub use debug::{
    DebugAction, DebugChange, DebugCost, DebugDivider, DebugEvery, DebugGradientNorm,
    DebugGroup, DebugIteration, DebugSink, DebugSolverState, DebugStepsize,
    DebugStoppingReason,
};
pub use record::{
    RecordAction, RecordChange, RecordCost, RecordEvery, RecordGradient, RecordGradientNorm,
    RecordGroup, RecordIteration, RecordSolverState, RecordedValue,
};
pub use solver::{get_solver_result, solve, Hook, Solver, SolverState};
pub use stepsize::{ArmijoLinesearch, ConstantStepsize, DecreasingStepsize, Stepsize};
pub use stopping_criterion::{
    CriterionValue, StopAfter, StopAfterIteration, StopWhenAll, StopWhenAny,
    StopWhenChangeLess, StopWhenCostLess, StopWhenGradientChangeLess,
    StopWhenGradientNormLess, StopWhenSmallerOrEqual, StopWhenStepsizeLess,
    StoppingCriterion,
};
pub use storage::StoreStateAction;
