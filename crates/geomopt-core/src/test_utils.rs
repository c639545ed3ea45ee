//! Common test fixtures: a flat manifold, a quadratic objective and a
//! minimal solver state.
//!
//! These are shared across the unit tests of this crate and, behind the
//! `test-utils` feature, by the downstream crates.

#![cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]

use crate::core::{
    error::Result,
    manifold::{
        InverseRetractionMethod, Manifold, RetractionMethod, VectorTransportMethod,
    },
    objective::Objective,
    problem::Problem,
    types::{DVector, Scalar},
    error::SolverResult,
};
use crate::optimization::solver::SolverState;

/// Flat Euclidean space; every manifold operation is trivial.
#[derive(Debug, Clone)]
pub struct TestEuclideanManifold {
    dim: usize,
}

impl TestEuclideanManifold {
    /// Creates the manifold of the given dimension.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl<T: Scalar> Manifold<T> for TestEuclideanManifold {
    type Point = DVector<T>;
    type TangentVector = DVector<T>;

    fn name(&self) -> &str {
        "TestEuclidean"
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn representation_shape(&self) -> Vec<usize> {
        vec![self.dim]
    }

    fn inner_product(
        &self,
        _point: &Self::Point,
        u: &Self::TangentVector,
        v: &Self::TangentVector,
    ) -> Result<T> {
        Ok(u.dot(v))
    }

    fn retract(
        &self,
        point: &Self::Point,
        tangent: &Self::TangentVector,
        _method: RetractionMethod,
        result: &mut Self::Point,
    ) -> Result<()> {
        result.copy_from(&(point + tangent));
        Ok(())
    }

    fn inverse_retract(
        &self,
        point: &Self::Point,
        other: &Self::Point,
        _method: InverseRetractionMethod,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        result.copy_from(&(other - point));
        Ok(())
    }

    fn vector_transport(
        &self,
        _from: &Self::Point,
        _to: &Self::Point,
        vector: &Self::TangentVector,
        _method: VectorTransportMethod,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        result.copy_from(vector);
        Ok(())
    }

    fn euclidean_to_riemannian_gradient(
        &self,
        _point: &Self::Point,
        euclidean_grad: &Self::TangentVector,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        result.copy_from(euclidean_grad);
        Ok(())
    }

    fn zero_tangent(&self, point: &Self::Point) -> Self::TangentVector {
        DVector::zeros(point.len())
    }

    fn scale_tangent(
        &self,
        _point: &Self::Point,
        scalar: T,
        tangent: &Self::TangentVector,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        result.copy_from(&(tangent * scalar));
        Ok(())
    }

    fn add_tangents(
        &self,
        _point: &Self::Point,
        u: &Self::TangentVector,
        v: &Self::TangentVector,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        result.copy_from(&(u + v));
        Ok(())
    }

    fn distance(&self, x: &Self::Point, y: &Self::Point) -> Result<T> {
        Ok((y - x).norm())
    }
}

/// Scaled quadratic cost `f(x) = s/2 ||x||^2` with gradient `s x`.
#[derive(Debug, Clone)]
pub struct QuadraticObjective {
    scale: f64,
}

impl QuadraticObjective {
    /// The unit quadratic.
    pub fn new() -> Self {
        Self { scale: 1.0 }
    }

    /// A quadratic scaled by `scale`.
    pub fn scaled(scale: f64) -> Self {
        Self { scale }
    }
}

impl Default for QuadraticObjective {
    fn default() -> Self {
        Self::new()
    }
}

impl Objective<f64, TestEuclideanManifold> for QuadraticObjective {
    fn cost(&self, _manifold: &TestEuclideanManifold, point: &DVector<f64>) -> SolverResult<f64> {
        Ok(0.5 * self.scale * point.norm_squared())
    }

    fn riemannian_gradient(
        &self,
        _manifold: &TestEuclideanManifold,
        point: &DVector<f64>,
    ) -> SolverResult<DVector<f64>> {
        Ok(point * self.scale)
    }
}

/// A quadratic test problem of the given dimension.
pub fn quadratic_problem(dim: usize) -> Problem<f64, TestEuclideanManifold, QuadraticObjective> {
    Problem::new(TestEuclideanManifold::new(dim), QuadraticObjective::new())
}

/// A quadratic test problem with scaled curvature.
pub fn scaled_quadratic_problem(
    dim: usize,
    scale: f64,
) -> Problem<f64, TestEuclideanManifold, QuadraticObjective> {
    Problem::new(
        TestEuclideanManifold::new(dim),
        QuadraticObjective::scaled(scale),
    )
}

/// Minimal state carrying just an iterate, a gradient and a stepsize.
#[derive(Debug, Clone)]
pub struct TestState {
    /// The current iterate.
    pub iterate: DVector<f64>,
    /// The current gradient.
    pub gradient: DVector<f64>,
    /// The last stepsize, exposed through `scalar_field("stepsize")`.
    pub stepsize: f64,
}

impl TestState {
    /// Creates a state from an iterate and a gradient.
    pub fn new(iterate: DVector<f64>, gradient: DVector<f64>) -> Self {
        Self {
            iterate,
            gradient,
            stepsize: f64::INFINITY,
        }
    }
}

impl SolverState<f64, TestEuclideanManifold> for TestState {
    fn iterate(&self) -> &DVector<f64> {
        &self.iterate
    }

    fn set_iterate(&mut self, point: DVector<f64>) {
        self.iterate = point;
    }

    fn gradient(&self) -> &DVector<f64> {
        &self.gradient
    }

    fn set_gradient(&mut self, gradient: DVector<f64>) {
        self.gradient = gradient;
    }

    fn last_stepsize(&self) -> f64 {
        self.stepsize
    }

    fn scalar_field(&self, name: &str) -> Option<f64> {
        match name {
            "stepsize" => Some(self.stepsize),
            _ => None,
        }
    }
}
