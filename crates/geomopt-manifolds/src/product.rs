//! Product of two manifolds.
//!
//! Points and tangents are pairs of component points and tangents; every
//! capability is the componentwise lift. The metric is the sum of the
//! component metrics, so distances satisfy d² = d₁² + d₂². Larger products
//! are built by nesting.

use geomopt_core::core::{
    error::Result,
    manifold::{
        InverseRetractionMethod, Manifold, RetractionMethod, VectorTransportMethod,
    },
    types::Scalar,
};
use num_traits::Float;

/// The product manifold M₁ × M₂.
#[derive(Debug, Clone)]
pub struct Product<M1, M2> {
    first: M1,
    second: M2,
    name: String,
}

impl<M1, M2> Product<M1, M2> {
    /// Returns the first factor.
    pub fn first(&self) -> &M1 {
        &self.first
    }

    /// Returns the second factor.
    pub fn second(&self) -> &M2 {
        &self.second
    }
}

impl<M1, M2> Product<M1, M2> {
    /// Combines two manifolds into their product.
    pub fn new(first: M1, second: M2) -> Self {
        Self {
            first,
            second,
            name: String::from("Product"),
        }
    }
}

impl<T, M1, M2> Manifold<T> for Product<M1, M2>
where
    T: Scalar,
    M1: Manifold<T>,
    M2: Manifold<T>,
{
    type Point = (M1::Point, M2::Point);
    type TangentVector = (M1::TangentVector, M2::TangentVector);

    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.first.dimension() + self.second.dimension()
    }

    fn representation_shape(&self) -> Vec<usize> {
        let first: usize = self.first.representation_shape().iter().product();
        let second: usize = self.second.representation_shape().iter().product();
        vec![first + second]
    }

    fn inner_product(
        &self,
        point: &Self::Point,
        u: &Self::TangentVector,
        v: &Self::TangentVector,
    ) -> Result<T> {
        let first = self.first.inner_product(&point.0, &u.0, &v.0)?;
        let second = self.second.inner_product(&point.1, &u.1, &v.1)?;
        Ok(first + second)
    }

    fn retract(
        &self,
        point: &Self::Point,
        tangent: &Self::TangentVector,
        method: RetractionMethod,
        result: &mut Self::Point,
    ) -> Result<()> {
        self.first.retract(&point.0, &tangent.0, method, &mut result.0)?;
        self.second.retract(&point.1, &tangent.1, method, &mut result.1)
    }

    fn inverse_retract(
        &self,
        point: &Self::Point,
        other: &Self::Point,
        method: InverseRetractionMethod,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        self.first
            .inverse_retract(&point.0, &other.0, method, &mut result.0)?;
        self.second
            .inverse_retract(&point.1, &other.1, method, &mut result.1)
    }

    fn vector_transport(
        &self,
        from: &Self::Point,
        to: &Self::Point,
        vector: &Self::TangentVector,
        method: VectorTransportMethod,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        self.first
            .vector_transport(&from.0, &to.0, &vector.0, method, &mut result.0)?;
        self.second
            .vector_transport(&from.1, &to.1, &vector.1, method, &mut result.1)
    }

    fn euclidean_to_riemannian_gradient(
        &self,
        point: &Self::Point,
        euclidean_grad: &Self::TangentVector,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        self.first
            .euclidean_to_riemannian_gradient(&point.0, &euclidean_grad.0, &mut result.0)?;
        self.second
            .euclidean_to_riemannian_gradient(&point.1, &euclidean_grad.1, &mut result.1)
    }

    fn zero_tangent(&self, point: &Self::Point) -> Self::TangentVector {
        (
            self.first.zero_tangent(&point.0),
            self.second.zero_tangent(&point.1),
        )
    }

    fn scale_tangent(
        &self,
        point: &Self::Point,
        scalar: T,
        tangent: &Self::TangentVector,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        self.first
            .scale_tangent(&point.0, scalar, &tangent.0, &mut result.0)?;
        self.second
            .scale_tangent(&point.1, scalar, &tangent.1, &mut result.1)
    }

    fn add_tangents(
        &self,
        point: &Self::Point,
        u: &Self::TangentVector,
        v: &Self::TangentVector,
        result: &mut Self::TangentVector,
    ) -> Result<()> {
        self.first.add_tangents(&point.0, &u.0, &v.0, &mut result.0)?;
        self.second.add_tangents(&point.1, &u.1, &v.1, &mut result.1)
    }

    fn distance(&self, x: &Self::Point, y: &Self::Point) -> Result<T> {
        let first = self.first.distance(&x.0, &y.0)?;
        let second = self.second.distance(&x.1, &y.1)?;
        Ok(<T as Float>::sqrt(first * first + second * second))
    }

    fn default_retraction(&self) -> RetractionMethod {
        self.first.default_retraction()
    }

    fn default_inverse_retraction(&self) -> InverseRetractionMethod {
        self.first.default_inverse_retraction()
    }

    fn default_vector_transport(&self) -> VectorTransportMethod {
        self.first.default_vector_transport()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Euclidean, Sphere};
    use approx::assert_relative_eq;
    use geomopt_core::core::types::DVector;

    fn fixture() -> Product<Sphere, Euclidean> {
        Product::new(Sphere::new(3).unwrap(), Euclidean::new(2).unwrap())
    }

    #[test]
    fn test_dimensions_add() {
        let product = fixture();
        assert_eq!(<Product<Sphere, Euclidean> as Manifold<f64>>::dimension(&product), 4);
        assert_eq!(
            <Product<Sphere, Euclidean> as Manifold<f64>>::representation_shape(&product),
            vec![5]
        );
    }

    #[test]
    fn test_componentwise_retract_and_metric() {
        let product = fixture();
        let p = (
            DVector::from_vec(vec![0.0, 0.0, 1.0]),
            DVector::from_vec(vec![1.0, -1.0]),
        );
        let v = (
            DVector::from_vec(vec![0.2, 0.0, 0.0]),
            DVector::from_vec(vec![0.5, 0.5]),
        );

        let mut q = p.clone();
        product
            .retract(&p, &v, RetractionMethod::Exponential, &mut q)
            .unwrap();
        assert_relative_eq!(q.0.norm(), 1.0, epsilon = 1e-12);
        assert_eq!(q.1, DVector::from_vec(vec![1.5, -0.5]));

        // Inner products sum over the factors.
        let ip = product.inner_product(&p, &v, &v).unwrap();
        assert_relative_eq!(ip, 0.04 + 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_distance_is_pythagorean() {
        let product = fixture();
        let p = (
            DVector::from_vec(vec![0.0, 0.0, 1.0]),
            DVector::from_vec(vec![0.0, 0.0]),
        );
        let q = (
            DVector::from_vec(vec![1.0, 0.0, 0.0]),
            DVector::from_vec(vec![3.0, 4.0]),
        );

        let d_sphere = std::f64::consts::FRAC_PI_2;
        let expected = (d_sphere * d_sphere + 25.0).sqrt();
        assert_relative_eq!(product.distance(&p, &q).unwrap(), expected, epsilon = 1e-12);
    }
}
