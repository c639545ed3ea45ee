//! Concrete Riemannian manifolds for the geomopt solver engine.
//!
//! The solvers only ever see the capability trait from `geomopt-core`; the
//! manifolds in this crate implement it:
//!
//! - [`Euclidean`]: flat R^n, mostly for sanity checks and product factors
//! - [`Sphere`]: the unit sphere S^{n-1} with exact exponential and
//!   logarithmic maps
//! - [`Product`]: the product of two manifolds with componentwise
//!   operations

pub mod euclidean;
pub mod product;
pub mod sphere;

pub use euclidean::Euclidean;
pub use product::Product;
pub use sphere::Sphere;
