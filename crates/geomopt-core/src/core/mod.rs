//! Core abstractions: scalars, errors, manifolds, objectives and problems.

pub mod cached_objective;
pub mod error;
pub mod manifold;
pub mod objective;
pub mod problem;
pub mod types;

pub use cached_objective::{ContentKey, LruCacheObjective, SimpleCacheObjective};
pub use error::{ManifoldError, Result, SolverError, SolverResult};
pub use manifold::{InverseRetractionMethod, Manifold, RetractionMethod, VectorTransportMethod};
pub use objective::{CountingObjective, GradientObjective, Objective, ProximalObjective};
pub use problem::{OptimizationProblem, Problem};
pub use types::{DVector, Scalar};
