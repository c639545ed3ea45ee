//! Core manifold capability trait.
//!
//! This module defines the `Manifold` trait through which the solver engine
//! sees every manifold. Points and tangent vectors are opaque associated
//! types; only the operations declared here ever touch their structure, so
//! the same solvers run on spheres, product manifolds and user-defined
//! manifolds alike.
//!
//! # Mathematical Background
//!
//! A Riemannian manifold (M, g) consists of a smooth manifold M and a metric
//! g that assigns an inner product to each tangent space. The engine relies
//! on:
//! - **Retraction**: a smooth map R_p: T_p M → M approximating the
//!   exponential map
//! - **Inverse retraction**: the inverse of R_p at a fixed base point
//! - **Vector transport**: moving tangent vectors between tangent spaces
//! - **Riemannian gradient**: the metric representation of the derivative

use crate::core::{error::Result, types::Scalar};
use num_traits::Float;
use std::fmt::Debug;

/// Selects how a manifold realizes its retraction.
///
/// Manifolds interpret the variants they support and return
/// [`ManifoldError::UnsupportedMethod`](crate::core::error::ManifoldError)
/// for the rest. Every manifold declares a default via
/// [`Manifold::default_retraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetractionMethod {
    /// The exponential map, exact where a closed form exists.
    Exponential,
    /// Projection of the ambient step back onto the manifold.
    Projection,
    /// QR-decomposition based retraction for matrix manifolds.
    Qr,
}

/// Selects how a manifold realizes its inverse retraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InverseRetractionMethod {
    /// The logarithmic map, inverse of the exponential map.
    Logarithmic,
    /// Projection of the ambient difference onto the tangent space.
    Projection,
}

/// Selects how a manifold transports tangent vectors between base points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorTransportMethod {
    /// Parallel transport along the connecting geodesic.
    Parallel,
    /// Projection of the vector onto the target tangent space.
    Projection,
}

/// Capability bundle for Riemannian manifolds.
///
/// The two associated types are opaque to the engine: `Point` is an element
/// of the manifold's representation, `TangentVector` an element of a tangent
/// space at a specific point. All operations must be total on their declared
/// domain and free of hidden global state.
///
/// Mutating operations follow the out-parameter convention: the caller
/// provides a pre-existing buffer (usually obtained from [`zero_tangent`] or
/// by cloning a point) and the operation overwrites it.
///
/// [`zero_tangent`]: Manifold::zero_tangent
pub trait Manifold<T: Scalar>: Debug + Send + Sync {
    /// An element of the manifold's representation.
    type Point: Clone + Debug + PartialEq + Send + Sync;

    /// An element of the tangent space at a specific point.
    type TangentVector: Clone + Debug + Send + Sync;

    /// Returns a human-readable name for the manifold.
    fn name(&self) -> &str;

    /// Returns the intrinsic dimension of the manifold.
    ///
    /// For example, the sphere S^{n-1} embedded in R^n has dimension n-1.
    fn dimension(&self) -> usize;

    /// Returns the shape of the point representation.
    ///
    /// The product of the entries is the number of scalar components a point
    /// occupies when flattened, which is what vectorizing adapters consume.
    fn representation_shape(&self) -> Vec<usize>;

    /// Computes the Riemannian inner product g_p(u, v) of two tangent
    /// vectors at `point`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands do not belong to the tangent space
    /// at `point` (where the manifold can detect this cheaply).
    fn inner_product(
        &self,
        point: &Self::Point,
        u: &Self::TangentVector,
        v: &Self::TangentVector,
    ) -> Result<T>;

    /// Computes the norm of a tangent vector, `sqrt(g_p(v, v))`.
    fn norm(&self, point: &Self::Point, vector: &Self::TangentVector) -> Result<T> {
        self.inner_product(point, vector, vector)
            .map(|ip| <T as Float>::sqrt(ip))
    }

    /// Performs a retraction from the tangent space to the manifold,
    /// writing R_p(v) into `result`.
    ///
    /// A retraction satisfies R_p(0) = p and dR_p(0) = id on T_p M.
    fn retract(
        &self,
        point: &Self::Point,
        tangent: &Self::TangentVector,
        method: RetractionMethod,
        result: &mut Self::Point,
    ) -> Result<()>;

    /// Computes the inverse retraction, writing a tangent vector at `point`
    /// into `result` such that retracting it reaches `other`.
    ///
    /// # Errors
    ///
    /// Returns an error if the inverse is not well-defined, e.g. at the cut
    /// locus.
    fn inverse_retract(
        &self,
        point: &Self::Point,
        other: &Self::Point,
        method: InverseRetractionMethod,
        result: &mut Self::TangentVector,
    ) -> Result<()>;

    /// Transports `vector`, a tangent at `from`, into the tangent space at
    /// `to`, writing the transported vector into `result`.
    fn vector_transport(
        &self,
        from: &Self::Point,
        to: &Self::Point,
        vector: &Self::TangentVector,
        method: VectorTransportMethod,
        result: &mut Self::TangentVector,
    ) -> Result<()>;

    /// Converts a Euclidean gradient into the Riemannian gradient at
    /// `point`, i.e. the unique tangent vector satisfying
    /// g_p(grad f, v) = df(v) for all v in T_p M.
    fn euclidean_to_riemannian_gradient(
        &self,
        point: &Self::Point,
        euclidean_grad: &Self::TangentVector,
        result: &mut Self::TangentVector,
    ) -> Result<()>;

    /// Returns the zero tangent vector at `point`.
    ///
    /// This is also the allocation seed for every tangent buffer the engine
    /// needs.
    fn zero_tangent(&self, point: &Self::Point) -> Self::TangentVector;

    /// Scales a tangent vector by `scalar`, writing into `result`.
    fn scale_tangent(
        &self,
        point: &Self::Point,
        scalar: T,
        tangent: &Self::TangentVector,
        result: &mut Self::TangentVector,
    ) -> Result<()>;

    /// Adds two tangent vectors at `point`, writing into `result`.
    fn add_tangents(
        &self,
        point: &Self::Point,
        u: &Self::TangentVector,
        v: &Self::TangentVector,
        result: &mut Self::TangentVector,
    ) -> Result<()>;

    /// Computes the geodesic distance between two points.
    ///
    /// The default implementation takes the norm of the default inverse
    /// retraction; manifolds with a closed-form distance override this.
    fn distance(&self, x: &Self::Point, y: &Self::Point) -> Result<T> {
        let mut log = self.zero_tangent(x);
        self.inverse_retract(x, y, self.default_inverse_retraction(), &mut log)?;
        self.norm(x, &log)
    }

    /// The retraction used when a state does not override it.
    fn default_retraction(&self) -> RetractionMethod {
        RetractionMethod::Exponential
    }

    /// The inverse retraction used when a state does not override it.
    fn default_inverse_retraction(&self) -> InverseRetractionMethod {
        InverseRetractionMethod::Logarithmic
    }

    /// The vector transport used when a state does not override it.
    fn default_vector_transport(&self) -> VectorTransportMethod {
        VectorTransportMethod::Parallel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEuclideanManifold;
    use crate::core::types::DVector;

    #[test]
    fn test_manifold_basic_properties() {
        let manifold = TestEuclideanManifold::new(10);
        assert_eq!(<TestEuclideanManifold as Manifold<f64>>::name(&manifold), "TestEuclidean");
        assert_eq!(<TestEuclideanManifold as Manifold<f64>>::dimension(&manifold), 10);
        assert_eq!(
            <TestEuclideanManifold as Manifold<f64>>::representation_shape(&manifold),
            vec![10]
        );
    }

    #[test]
    fn test_default_implementations() {
        let manifold = TestEuclideanManifold::new(3);
        let point: DVector<f64> = DVector::zeros(3);
        let vector = DVector::from_vec(vec![1.0, 0.0, 0.0]);

        // norm goes through inner_product
        let norm = manifold.norm(&point, &vector).unwrap();
        assert_eq!(norm, 1.0);

        // distance goes through inverse_retract and norm
        let other = DVector::from_vec(vec![0.0, 3.0, 4.0]);
        let dist = manifold.distance(&point, &other).unwrap();
        assert_eq!(dist, 5.0);
    }

    #[test]
    fn test_manifold_is_send_sync() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<TestEuclideanManifold>();
    }
}
