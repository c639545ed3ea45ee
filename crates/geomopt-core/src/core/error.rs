//! Error types for manifold operations and the solver engine.

use thiserror::Error;

/// Errors produced by manifold construction and manifold operations.
///
/// The variants follow the ways a capability call can actually go wrong in
/// this engine: the manifold cannot be built, an operand does not fit its
/// representation, a selected method is not provided, or the operation has
/// no well-defined result at the given arguments.
#[derive(Debug, Clone, Error)]
pub enum ManifoldError {
    /// The manifold cannot be built from the given parameters.
    #[error("cannot construct {manifold}: {details}")]
    InvalidConstruction {
        /// Name of the manifold being constructed
        manifold: String,
        /// What was wrong with the parameters
        details: String,
    },

    /// An operand does not match the manifold's representation size.
    #[error("{operation}: operand has {actual} components, the representation has {expected}")]
    OperandMismatch {
        /// The operation that received the operand
        operation: String,
        /// Component count of the representation
        expected: usize,
        /// Component count of the operand
        actual: usize,
    },

    /// A retraction, inverse retraction or transport method the manifold
    /// does not provide.
    #[error("{manifold} does not provide {method}")]
    UnsupportedMethod {
        /// Name of the manifold
        manifold: String,
        /// The missing method
        method: String,
    },

    /// The operation has no well-defined result at the given arguments,
    /// e.g. a logarithmic map between antipodal points.
    #[error("{operation} is undefined here: {details}")]
    UndefinedResult {
        /// The operation that failed
        operation: String,
        /// Why the result is undefined
        details: String,
    },
}

impl ManifoldError {
    /// Create an InvalidConstruction error.
    pub fn invalid_construction(
        manifold: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::InvalidConstruction {
            manifold: manifold.into(),
            details: details.into(),
        }
    }

    /// Create an OperandMismatch error.
    pub fn operand_mismatch(
        operation: impl Into<String>,
        expected: usize,
        actual: usize,
    ) -> Self {
        Self::OperandMismatch {
            operation: operation.into(),
            expected,
            actual,
        }
    }

    /// Create an UnsupportedMethod error.
    pub fn unsupported_method(manifold: impl Into<String>, method: impl Into<String>) -> Self {
        Self::UnsupportedMethod {
            manifold: manifold.into(),
            method: method.into(),
        }
    }

    /// Create an UndefinedResult error.
    pub fn undefined_result(operation: impl Into<String>, details: impl Into<String>) -> Self {
        Self::UndefinedResult {
            operation: operation.into(),
            details: details.into(),
        }
    }
}

/// Errors that can occur while configuring or running a solver.
#[derive(Debug, Clone, Error)]
pub enum SolverError {
    /// Invalid solver configuration, raised at setup time.
    #[error("Invalid solver configuration: {reason} ({parameter} = {value})")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
        /// Name of the invalid parameter
        parameter: String,
        /// Value that was invalid
        value: String,
    },

    /// An operation was requested from an objective that does not provide it,
    /// e.g. a proximal map from a purely smooth objective.
    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation {
        /// Name of the missing operation
        operation: String,
    },

    /// The search direction handed to a line search is not a descent
    /// direction.
    #[error("Invalid search direction: not a descent direction")]
    NonDescentDirection,

    /// Propagated manifold error.
    #[error("Manifold operation failed: {0}")]
    Manifold(#[from] ManifoldError),
}

impl SolverError {
    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S1, S2, S3>(reason: S1, parameter: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidConfiguration {
            reason: reason.into(),
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    /// Create an UnsupportedOperation error.
    pub fn unsupported_operation<S: Into<String>>(operation: S) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
        }
    }
}

/// Result type alias for operations that can produce a ManifoldError.
pub type Result<T> = std::result::Result<T, ManifoldError>;

/// Result type alias for solver operations.
pub type SolverResult<T> = std::result::Result<T, SolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifold_error_creation() {
        let err = ManifoldError::invalid_construction("Sphere", "ambient dimension must be at least 2");
        assert!(matches!(err, ManifoldError::InvalidConstruction { .. }));
        assert_eq!(
            err.to_string(),
            "cannot construct Sphere: ambient dimension must be at least 2"
        );

        let err = ManifoldError::operand_mismatch("inner product", 3, 4);
        assert_eq!(
            err.to_string(),
            "inner product: operand has 4 components, the representation has 3"
        );
    }

    #[test]
    fn test_manifold_error_display() {
        let errors = vec![
            ManifoldError::invalid_construction("Euclidean", "dimension must be at least 1"),
            ManifoldError::operand_mismatch("retraction", 2, 3),
            ManifoldError::unsupported_method("Sphere", "the QR retraction"),
            ManifoldError::undefined_result("logarithmic map", "antipodal points"),
        ];

        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn test_solver_error_creation() {
        let err = SolverError::invalid_configuration("must be positive", "stepsize", "-0.1");
        assert!(matches!(err, SolverError::InvalidConfiguration { .. }));
        assert!(err.to_string().contains("stepsize"));

        let err = SolverError::unsupported_operation("proximal map");
        assert!(err.to_string().contains("proximal map"));
    }

    #[test]
    fn test_manifold_error_propagation() {
        let manifold_err = ManifoldError::undefined_result("exponential map", "singular metric");
        let solver_err: SolverError = manifold_err.into();

        assert!(matches!(solver_err, SolverError::Manifold(_)));
        assert!(solver_err.to_string().contains("singular metric"));
    }
}
