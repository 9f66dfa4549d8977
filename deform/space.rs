//! Finite-dimensional deformation spaces built from a Gaussian process's
//! truncated eigenbasis.
//!
//! A parameter vector `α` selects the deformation
//!
//! ```text
//! T_α(x) = x + m(x) + Σ_i α_i √λ_i φ_i(x)
//! ```
//!
//! which is linear in `α`. The Jacobian with respect to the parameters is
//! therefore independent of `α`, which is what an external gradient-based
//! optimizer consumes.

use crate::domain::DiscreteDomain;
use crate::nystrom::{EigenPair, NystromApproximator, NystromBasis, NystromConfig, NystromError};
use crate::process::GaussianProcess;
use crate::types::{ParameterVector, Point1};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpaceError {
    #[error("Failed to build the eigenbasis of the transformation space: {0}")]
    Nystrom(#[from] NystromError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Parameter vector has {found} entries, but the transformation space has {expected}.")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Parameter {index} is not finite.")]
    NonFiniteParameter { index: usize },

    #[error("Operation '{operation}' is not supported by this transformation.")]
    UnsupportedOperation { operation: &'static str },

    #[error("Operation '{operation}' is not implemented for this transformation.")]
    NotImplemented { operation: &'static str },
}

/// A spatial transformation bound to fixed parameters.
pub trait ParametricTransformation: Send + Sync {
    fn evaluate(&self, x: &Point1) -> Point1;

    /// `∂T(x) / ∂α`, one entry per parameter.
    fn derivative_wrt_parameters(&self, x: &Point1) -> Array1<f64>;

    /// `∂T(x) / ∂x`.
    fn spatial_derivative(&self, x: &Point1) -> Result<f64, TransformError>;

    fn inverse(&self) -> Result<Box<dyn ParametricTransformation + '_>, TransformError>;
}

/// The contract exposed to registration loops.
pub trait TransformationSpace {
    type Transformation<'a>: ParametricTransformation
    where
        Self: 'a;

    fn parameters_dimensionality(&self) -> usize;

    fn apply(&self, parameters: ParameterVector)
    -> Result<Self::Transformation<'_>, TransformError>;

    fn identity_parameters(&self) -> ParameterVector {
        ParameterVector::zeros(self.parameters_dimensionality())
    }
}

/// Parametric deformations spanned by the leading eigenfunctions of a GP
/// kernel over a 1-D domain.
///
/// The eigendecomposition runs once in [`KernelTransformationSpace::new`];
/// afterwards the space is immutable and can be shared across threads.
#[derive(Debug, Clone)]
pub struct KernelTransformationSpace {
    domain: DiscreteDomain<1>,
    process: GaussianProcess<1>,
    basis: NystromBasis<1>,
    sqrt_eigenvalues: Array1<f64>,
}

impl KernelTransformationSpace {
    pub fn new(
        domain: DiscreteDomain<1>,
        num_parameters: usize,
        process: GaussianProcess<1>,
        config: &NystromConfig,
    ) -> Result<Self, SpaceError> {
        let basis = NystromApproximator::new(*config).approximate(
            domain.points(),
            process.kernel().clone(),
            num_parameters,
        )?;
        log::info!(
            "Transformation space ready: {} parameters over {} domain points",
            basis.len(),
            domain.len()
        );
        Ok(Self::from_basis(domain, process, basis))
    }

    /// Wraps an already computed basis. The basis must be built from
    /// `process`'s kernel.
    pub fn from_basis(
        domain: DiscreteDomain<1>,
        process: GaussianProcess<1>,
        basis: NystromBasis<1>,
    ) -> Self {
        let sqrt_eigenvalues = basis.eigenvalues().mapv(f64::sqrt);
        Self {
            domain,
            process,
            basis,
            sqrt_eigenvalues,
        }
    }

    pub fn domain(&self) -> &DiscreteDomain<1> {
        &self.domain
    }

    pub fn gaussian_process(&self) -> &GaussianProcess<1> {
        &self.process
    }

    pub fn basis(&self) -> &NystromBasis<1> {
        &self.basis
    }

    pub fn eigen_pairs(&self) -> impl Iterator<Item = EigenPair<'_, 1>> {
        self.basis.eigen_pairs()
    }

    /// `[√λ_0 φ_0(x), ..., √λ_{P-1} φ_{P-1}(x)]`.
    pub fn scaled_basis_at(&self, x: &Point1) -> Array1<f64> {
        self.basis.eigenfunctions_at(x) * &self.sqrt_eigenvalues
    }

    fn validate(&self, parameters: &ParameterVector) -> Result<(), TransformError> {
        let expected = self.parameters_dimensionality();
        if parameters.len() != expected {
            return Err(TransformError::DimensionMismatch {
                expected,
                found: parameters.len(),
            });
        }
        if let Some(index) = parameters.iter().position(|v| !v.is_finite()) {
            return Err(TransformError::NonFiniteParameter { index });
        }
        Ok(())
    }
}

impl TransformationSpace for KernelTransformationSpace {
    type Transformation<'a> = Transformation<'a>;

    fn parameters_dimensionality(&self) -> usize {
        self.basis.len()
    }

    fn apply(&self, parameters: ParameterVector) -> Result<Transformation<'_>, TransformError> {
        self.validate(&parameters)?;
        let weights = &*parameters * &self.sqrt_eigenvalues;
        Ok(Transformation {
            space: self,
            parameters,
            weights,
        })
    }
}

/// A [`KernelTransformationSpace`] bound to one parameter vector.
#[derive(Debug, Clone)]
pub struct Transformation<'a> {
    space: &'a KernelTransformationSpace,
    parameters: ParameterVector,
    /// `α_i √λ_i`.
    weights: Array1<f64>,
}

impl Transformation<'_> {
    pub fn parameters(&self) -> &ParameterVector {
        &self.parameters
    }

    /// Displacement `T(x) - x`.
    pub fn displacement(&self, x: &Point1) -> f64 {
        let mean = self.space.process.mean().evaluate(x);
        mean + self.space.basis.eigenfunctions_at(x).dot(&self.weights)
    }

    pub fn evaluate_many(&self, points: &[Point1]) -> Vec<Point1> {
        points.par_iter().map(|p| self.evaluate(p)).collect()
    }

    /// Parameter Jacobian at each point, one row per point.
    pub fn jacobian(&self, points: &[Point1]) -> Array2<f64> {
        self.space.basis.eigenfunctions_at_many(points) * &self.space.sqrt_eigenvalues
    }
}

impl ParametricTransformation for Transformation<'_> {
    fn evaluate(&self, x: &Point1) -> Point1 {
        Point1::from(x.x() + self.displacement(x))
    }

    fn derivative_wrt_parameters(&self, x: &Point1) -> Array1<f64> {
        self.space.scaled_basis_at(x)
    }

    // TODO: differentiate the kernel vector analytically once kernels expose
    // their spatial gradient.
    fn spatial_derivative(&self, _x: &Point1) -> Result<f64, TransformError> {
        Err(TransformError::NotImplemented {
            operation: "spatial_derivative",
        })
    }

    /// Kernel deformations are not guaranteed to be invertible.
    fn inverse(&self) -> Result<Box<dyn ParametricTransformation + '_>, TransformError> {
        Err(TransformError::UnsupportedOperation {
            operation: "inverse",
        })
    }
}
