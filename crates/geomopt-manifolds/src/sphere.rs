//! The unit sphere S^{n-1} = {x in R^n : ||x|| = 1}.
//!
//! Points are unit vectors; the tangent space at x consists of all vectors
//! orthogonal to x. The sphere carries the canonical metric inherited from
//! the ambient space and has closed-form exponential and logarithmic maps:
//!
//! - exp_x(v) = cos(||v||) x + sin(||v||) v/||v||
//! - log_x(y) = θ (y - cos(θ) x) / sin(θ) with θ = arccos(x^T y)

use geomopt_core::core::{
    error::{ManifoldError, Result},
    manifold::{
        InverseRetractionMethod, Manifold, RetractionMethod, VectorTransportMethod,
    },
    types::{DVector, Scalar},
};
use num_traits::Float;
use rand::Rng;
use rand_distr::StandardNormal;

/// The unit sphere S^{n-1} embedded in R^n.
#[derive(Debug, Clone)]
pub struct Sphere {
    ambient_dim: usize,
}

impl Sphere {
    /// Creates the sphere S^{n-1} embedded in R^n.
    ///
    /// # Errors
    ///
    /// Returns an error if `ambient_dim` < 2.
    pub fn new(ambient_dim: usize) -> Result<Self> {
        if ambient_dim < 2 {
            return Err(ManifoldError::invalid_construction(
                "Sphere",
                "ambient dimension must be at least 2",
            ));
        }
        Ok(Self { ambient_dim })
    }

    /// Returns the ambient dimension n.
    pub fn ambient_dimension(&self) -> usize {
        self.ambient_dim
    }

    /// Projects an ambient vector onto the tangent space at `point`.
    pub fn project_tangent<T: Scalar>(
        &self,
        point: &DVector<T>,
        vector: &DVector<T>,
    ) -> DVector<T> {
        vector - point * point.dot(vector)
    }

    /// Samples a uniformly distributed point.
    pub fn random_point<T: Scalar, R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<T> {
        loop {
            let ambient = DVector::from_fn(self.ambient_dim, |_, _| {
                let sample: f64 = rng.sample(StandardNormal);
                <T as Scalar>::from_f64(sample)
            });
            let norm = ambient.norm();
            if norm > T::EPSILON {
                return ambient / norm;
            }
        }
    }

    /// Samples a unit tangent vector at `point`.
    pub fn random_tangent<T: Scalar, R: Rng + ?Sized>(
        &self,
        point: &DVector<T>,
        rng: &mut R,
    ) -> DVector<T> {
        loop {
            let ambient = DVector::from_fn(self.ambient_dim, |_, _| {
                let sample: f64 = rng.sample(StandardNormal);
                <T as Scalar>::from_f64(sample)
            });
            let tangent = self.project_tangent(point, &ambient);
            let norm = tangent.norm();
            if norm > T::EPSILON {
                return tangent / norm;
            }
        }
    }

    /// The exponential map exp_x(v), a point on the great circle through x
    /// in direction v.
    fn exp_map<T: Scalar>(&self, point: &DVector<T>, tangent: &DVector<T>) -> DVector<T> {
        let angle = tangent.norm();
        if angle < T::EPSILON {
            return point.clone();
        }
        let cos = <T as Float>::cos(angle);
        let sin = <T as Float>::sin(angle);
        point * cos + tangent * (sin / angle)
    }

    /// The logarithmic map log_x(y).
    ///
    /// # Errors
    ///
    /// Returns a numerical error for antipodal points, where the map is not
    /// unique.
    fn log_map<T: Scalar>(&self, point: &DVector<T>, other: &DVector<T>) -> Result<DVector<T>> {
        let cos_angle = <T as Float>::max(
            <T as Float>::min(point.dot(other), T::one()),
            -T::one(),
        );
        let angle = <T as Float>::acos(cos_angle);

        if angle < T::EPSILON {
            return Ok(DVector::zeros(self.ambient_dim));
        }

        let sin_angle = <T as Float>::sin(angle);
        if sin_angle < T::EPSILON {
            return Err(ManifoldError::undefined_result(
                "logarithmic map",
                "antipodal points have no unique connecting geodesic",
            ));
        }

        Ok((other - point * cos_angle) * (angle / sin_angle))
    }
}

impl<T: Scalar> Manifold<T> for Sphere {
    type Point = DVector<T>;
    type TangentVector = DVector<T>;

    fn name(&self) -> &str {
        "Sphere"
    }

    fn dimension(&self) -> usize {
        self.ambient_dim - 1
    }

    fn representation_shape(&self) -> Vec<usize> {
        vec![self.ambient_dim]
    }

    fn inner_product(
        &self,
        _point: &Self::Point,
        u: &Self::TangentVector,
        v: &Self::TangentVector,
    ) -> Result<T> {
        // Canonical metric inherited from the ambient space.
        Ok(u.dot(v))
    }

    fn retract(
        &self,
        point: &Self::Point,
        tangent: &Self::TangentVector,
        method: RetractionMethod,
        result: &mut Self::Point,
    ) -> Result<()> {
        match method {
            RetractionMethod::Exponential => {
                result.copy_from(&self.exp_map(point, tangent));
                Ok(())
            }
            RetractionMethod::Projection => {
                let moved = point + tangent;
                let norm = moved.norm();
                if norm < T::EPSILON {
                    return Err(ManifoldError::undefined_result(
                        "projection retraction",
                        "the ambient step reaches the origin",
                    ));
                }
                result.copy_from(&(moved / norm));
                Ok(())
            }
            RetractionMethod::Qr => Err(ManifoldError::unsupported_method(
                "Sphere",
                "the QR retraction",
            )),
        }
    }

    fn inverse_retract(
        &self,
        point: &Self::Point,
        other: &Self::Point,
        method: InverseRetractionMethod,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        match method {
            InverseRetractionMethod::Logarithmic => {
                result.copy_from(&self.log_map(point, other)?);
                Ok(())
            }
            InverseRetractionMethod::Projection => {
                result.copy_from(&self.project_tangent(point, &(other - point)));
                Ok(())
            }
        }
    }

    fn vector_transport(
        &self,
        from: &Self::Point,
        to: &Self::Point,
        vector: &Self::TangentVector,
        method: VectorTransportMethod,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        match method {
            VectorTransportMethod::Parallel => {
                let log = self.log_map(from, to)?;
                let angle = log.norm();
                if angle < T::EPSILON {
                    result.copy_from(vector);
                    return Ok(());
                }
                // Decompose along the geodesic direction u = log/θ; the
                // component along u rotates, the orthogonal part is
                // unchanged.
                let unit = &log / angle;
                let along = unit.dot(vector);
                let cos = <T as Float>::cos(angle);
                let sin = <T as Float>::sin(angle);
                let transported = vector + (&unit * (cos - T::one()) - from * sin) * along;
                result.copy_from(&transported);
                Ok(())
            }
            VectorTransportMethod::Projection => {
                result.copy_from(&self.project_tangent(to, vector));
                Ok(())
            }
        }
    }

    fn euclidean_to_riemannian_gradient(
        &self,
        point: &Self::Point,
        euclidean_grad: &Self::TangentVector,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        result.copy_from(&self.project_tangent(point, euclidean_grad));
        Ok(())
    }

    fn zero_tangent(&self, _point: &Self::Point) -> Self::TangentVector {
        DVector::zeros(self.ambient_dim)
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
        let cos_angle = <T as Float>::max(
            <T as Float>::min(x.dot(y), T::one()),
            -T::one(),
        );
        Ok(<T as Float>::acos(cos_angle))
    }
}
