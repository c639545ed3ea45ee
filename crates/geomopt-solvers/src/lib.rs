//! Solvers for Riemannian optimization.
//!
//! This crate provides the concrete solvers on top of the `geomopt-core`
//! engine:
//!
//! - [`gradient_descent`]: Riemannian gradient descent with pluggable
//!   stepsize rules, direction updates and retraction choices
//! - [`cyclic_proximal_point`]: cyclic proximal point for objectives split
//!   into components with known proximal maps
//!
//! The high-level entry points ([`gradient_descent()`],
//! [`gradient_descent_with_options()`], [`gradient_descent_with_state()`])
//! assemble the decorated solve pipeline from an options bag; the state
//! types compose with the engine's [`solve`] driver directly for full
//! control.

pub mod cyclic_proximal_point;
pub mod gradient_descent;

pub use cyclic_proximal_point::CyclicProximalPointState;
pub use gradient_descent::{
    gradient_descent, gradient_descent_with_options, gradient_descent_with_state,
    CacheSpec, DebugSpec, DecoratedGradientDescentState, DirectionUpdate,
    GradientDescentOptions, GradientDescentState, RecordSpec, SteepestDescent,
};

pub use geomopt_core::optimization::solver::{get_solver_result, solve};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::cyclic_proximal_point::CyclicProximalPointState;
    pub use crate::gradient_descent::{
        gradient_descent, gradient_descent_with_options, gradient_descent_with_state,
        CacheSpec, DebugSpec, DecoratedGradientDescentState, DirectionUpdate,
        GradientDescentOptions, GradientDescentState, RecordSpec, SteepestDescent,
    };
    pub use geomopt_core::prelude::*;
}
