//! Euclidean space R^n as a flat manifold.
//!
//! All operations are the obvious linear ones. The manifold is mostly used
//! for sanity checks and as the flat factor of product manifolds.

use geomopt_core::core::{
    error::{ManifoldError, Result},
    manifold::{
        InverseRetractionMethod, Manifold, RetractionMethod, VectorTransportMethod,
    },
    types::{DVector, Scalar},
};
use rand::Rng;
use rand_distr::StandardNormal;

/// Flat Euclidean space R^n.
#[derive(Debug, Clone)]
pub struct Euclidean {
    dim: usize,
}

impl Euclidean {
    /// Creates R^n.
    ///
    /// # Errors
    ///
    /// Returns an error for dimension zero.
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(ManifoldError::invalid_construction(
                "Euclidean",
                "dimension must be at least 1",
            ));
        }
        Ok(Self { dim })
    }

    /// Samples a point with standard normal components.
    pub fn random_point<T: Scalar, R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<T> {
        DVector::from_fn(self.dim, |_, _| {
            let sample: f64 = rng.sample(StandardNormal);
            <T as Scalar>::from_f64(sample)
        })
    }

    fn check_dim<T: Scalar>(&self, operation: &str, vector: &DVector<T>) -> Result<()> {
        if vector.len() != self.dim {
            return Err(ManifoldError::operand_mismatch(
                operation,
                self.dim,
                vector.len(),
            ));
        }
        Ok(())
    }
}

impl<T: Scalar> Manifold<T> for Euclidean {
    type Point = DVector<T>;
    type TangentVector = DVector<T>;

    fn name(&self) -> &str {
        "Euclidean"
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
        self.check_dim("inner product", u)?;
        self.check_dim("inner product", v)?;
        Ok(u.dot(v))
    }

    fn retract(
        &self,
        point: &Self::Point,
        tangent: &Self::TangentVector,
        _method: RetractionMethod,
        result: &mut Self::Point,
    ) -> Result<()> {
        // Every retraction of a flat space is the straight line.
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

    fn zero_tangent(&self, _point: &Self::Point) -> Self::TangentVector {
        DVector::zeros(self.dim)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction() {
        assert!(Euclidean::new(0).is_err());
        let space = Euclidean::new(3).unwrap();
        assert_eq!(<Euclidean as Manifold<f64>>::dimension(&space), 3);
        assert_eq!(<Euclidean as Manifold<f64>>::representation_shape(&space), vec![3]);
    }

    #[test]
    fn test_flat_operations() {
        let space = Euclidean::new(2).unwrap();
        let p = DVector::from_vec(vec![1.0, 2.0]);
        let v = DVector::from_vec(vec![0.5, -1.0]);

        let mut q = p.clone();
        space
            .retract(&p, &v, RetractionMethod::Exponential, &mut q)
            .unwrap();
        assert_eq!(q, DVector::from_vec(vec![1.5, 1.0]));

        let mut log = space.zero_tangent(&p);
        space
            .inverse_retract(&p, &q, InverseRetractionMethod::Logarithmic, &mut log)
            .unwrap();
        assert_eq!(log, v);

        assert_eq!(space.distance(&p, &q).unwrap(), v.norm());
    }

    #[test]
    fn test_operand_mismatch_is_reported() {
        let space = Euclidean::new(2).unwrap();
        let p = DVector::from_vec(vec![1.0, 2.0]);
        let bad = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let err = space.inner_product(&p, &bad, &bad).unwrap_err();
        assert!(matches!(err, ManifoldError::OperandMismatch { .. }));
    }
}
