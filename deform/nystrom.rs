//! Nystrom approximation of a kernel's eigendecomposition.
//!
//! The kernel is discretised on a landmark set of `N` points, the resulting
//! Gram matrix is eigendecomposed, and each discrete eigenvector `u_i` with
//! matrix eigenvalue `λ_i` is extended to a continuous eigenfunction
//!
//! ```text
//! φ_i(x) = (√N / λ_i) · Σ_j u_i[j] · k(x, x_j)
//! ```
//!
//! The eigenvalue of the integral operator that `φ_i` approximates is
//! `λ_i / N`; that is the value reported by [`EigenPair::eigenvalue`]. With
//! this scaling `Σ_i (λ_i / N) φ_i(x) φ_i(y)` reproduces `k(x, y)` on the
//! landmarks.

use crate::faer_ndarray::{FaerLinalgError, descending_eigh};
use crate::kernel::SharedKernel;
use crate::matrix::{compute_cross_kernel_matrix, compute_kernel_matrix, compute_kernel_vector_for};
use crate::types::Point;
use ndarray::{Array1, Array2, ArrayView1, s};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NystromError {
    #[error("Cannot build a Nystrom basis from an empty landmark set.")]
    EmptyDomain,

    #[error("Requested {requested} eigenpairs, but the landmark set only has {available} points.")]
    InvalidParameterCount { requested: usize, available: usize },

    #[error(
        "All {requested} requested eigenvalues are at or below the tolerance {tolerance:e}; the kernel is numerically zero on the landmarks."
    )]
    AllEigenvaluesBelowTolerance { requested: usize, tolerance: f64 },

    #[error("Stored basis is inconsistent: {0}")]
    InconsistentBasis(String),

    #[error("Eigendecomposition of the kernel matrix failed: {0}")]
    Linalg(#[from] FaerLinalgError),
}

/// Numerical policy for dropping degenerate eigenpairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NystromConfig {
    /// Eigenvalues `λ <= max(tol, tol * λ_max)` are dropped rather than
    /// divided by.
    pub relative_tolerance: f64,
}

impl Default for NystromConfig {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NystromApproximator {
    config: NystromConfig,
}

impl NystromApproximator {
    pub fn new(config: NystromConfig) -> Self {
        Self { config }
    }

    /// Computes up to `num_parameters` eigenpairs of `kernel` over `landmarks`.
    ///
    /// Pairs whose eigenvalue falls under the tolerance are dropped (and
    /// reported through [`NystromBasis::dropped`]), so the returned basis can
    /// be smaller than requested but never contains a near-zero eigenvalue.
    pub fn approximate<const D: usize>(
        &self,
        landmarks: &[Point<D>],
        kernel: SharedKernel<D>,
        num_parameters: usize,
    ) -> Result<NystromBasis<D>, NystromError> {
        let n = landmarks.len();
        if n == 0 {
            return Err(NystromError::EmptyDomain);
        }
        if num_parameters == 0 || num_parameters > n {
            return Err(NystromError::InvalidParameterCount {
                requested: num_parameters,
                available: n,
            });
        }

        log::info!(
            "Computing Nystrom basis: {} landmarks, {} requested eigenpairs",
            n,
            num_parameters
        );
        let gram = compute_kernel_matrix(landmarks, kernel.as_ref());
        let (values, vectors) = descending_eigh(&gram)?;

        let tol = self.config.relative_tolerance;
        let max_eig = values.first().copied().unwrap_or(0.0);
        let threshold = if max_eig > 0.0 {
            (max_eig * tol).max(tol)
        } else {
            tol
        };

        // values are descending, so the retained pairs form a prefix
        let retained = values
            .iter()
            .take(num_parameters)
            .take_while(|&&v| v > threshold)
            .count();
        if retained == 0 {
            return Err(NystromError::AllEigenvaluesBelowTolerance {
                requested: num_parameters,
                tolerance: threshold,
            });
        }
        if retained < num_parameters {
            log::warn!(
                "Dropped {} of {} requested eigenpairs with eigenvalue <= {:e}",
                num_parameters - retained,
                num_parameters,
                threshold
            );
        }
        log::debug!(
            "Leading matrix eigenvalues: {:?}",
            values.slice(s![..retained.min(8)])
        );

        NystromBasis::from_parts(
            landmarks.to_vec(),
            kernel,
            values.slice(s![..retained]).to_owned(),
            vectors.slice(s![.., ..retained]).to_owned(),
            num_parameters,
        )
    }
}

/// A cached, truncated eigenbasis of a kernel.
#[derive(Debug, Clone)]
pub struct NystromBasis<const D: usize> {
    landmarks: Vec<Point<D>>,
    kernel: SharedKernel<D>,
    matrix_eigenvalues: Array1<f64>,
    eigenvalues: Array1<f64>,
    eigenvectors: Array2<f64>,
    /// Column `i` holds `u_i · √N / λ_i`.
    coefficients: Array2<f64>,
    requested: usize,
}

impl<const D: usize> NystromBasis<D> {
    /// Rebuilds a basis from stored eigenvectors without re-running the eigensolver.
    pub fn from_parts(
        landmarks: Vec<Point<D>>,
        kernel: SharedKernel<D>,
        matrix_eigenvalues: Array1<f64>,
        eigenvectors: Array2<f64>,
        requested: usize,
    ) -> Result<Self, NystromError> {
        let n = landmarks.len();
        let r = matrix_eigenvalues.len();
        if eigenvectors.dim() != (n, r) {
            return Err(NystromError::InconsistentBasis(format!(
                "eigenvector matrix is {:?}, expected ({}, {})",
                eigenvectors.dim(),
                n,
                r
            )));
        }
        if let Some(bad) = matrix_eigenvalues.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
            return Err(NystromError::InconsistentBasis(format!(
                "eigenvalue {bad} is not strictly positive"
            )));
        }
        if r > requested {
            return Err(NystromError::InconsistentBasis(format!(
                "{r} eigenpairs stored but only {requested} requested"
            )));
        }

        let sqrt_n = (n as f64).sqrt();
        let mut coefficients = eigenvectors.clone();
        for (mut col, &lambda) in coefficients.columns_mut().into_iter().zip(matrix_eigenvalues.iter()) {
            col *= sqrt_n / lambda;
        }
        let eigenvalues = matrix_eigenvalues.mapv(|lambda| lambda / n as f64);

        Ok(Self {
            landmarks,
            kernel,
            matrix_eigenvalues,
            eigenvalues,
            eigenvectors,
            coefficients,
            requested,
        })
    }

    /// Number of retained eigenpairs.
    pub fn len(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Requested pairs discarded under the tolerance policy.
    pub fn dropped(&self) -> usize {
        self.requested - self.len()
    }

    /// Operator eigenvalues `λ_i / N`, descending.
    pub fn eigenvalues(&self) -> ArrayView1<'_, f64> {
        self.eigenvalues.view()
    }

    /// Eigenvalues of the landmark Gram matrix, descending.
    pub fn matrix_eigenvalues(&self) -> ArrayView1<'_, f64> {
        self.matrix_eigenvalues.view()
    }

    /// Unit eigenvectors of the Gram matrix, one per column.
    pub fn eigenvectors(&self) -> &Array2<f64> {
        &self.eigenvectors
    }

    pub fn landmarks(&self) -> &[Point<D>] {
        &self.landmarks
    }

    pub fn kernel(&self) -> &SharedKernel<D> {
        &self.kernel
    }

    /// `[φ_0(x), ..., φ_{r-1}(x)]` from a single kernel-vector product.
    pub fn eigenfunctions_at(&self, x: &Point<D>) -> Array1<f64> {
        let kx = compute_kernel_vector_for(x, &self.landmarks, self.kernel.as_ref());
        kx.dot(&self.coefficients)
    }

    /// Row `j` holds `eigenfunctions_at(&points[j])`.
    pub fn eigenfunctions_at_many(&self, points: &[Point<D>]) -> Array2<f64> {
        compute_cross_kernel_matrix(points, &self.landmarks, self.kernel.as_ref())
            .dot(&self.coefficients)
    }

    pub fn eigen_pair(&self, index: usize) -> Option<EigenPair<'_, D>> {
        (index < self.len()).then_some(EigenPair { basis: self, index })
    }

    pub fn eigen_pairs(&self) -> impl Iterator<Item = EigenPair<'_, D>> {
        (0..self.len()).map(move |index| EigenPair { basis: self, index })
    }
}

/// One `(eigenvalue, eigenfunction)` component of a [`NystromBasis`].
#[derive(Debug, Clone, Copy)]
pub struct EigenPair<'a, const D: usize> {
    basis: &'a NystromBasis<D>,
    index: usize,
}

impl<const D: usize> EigenPair<'_, D> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn eigenvalue(&self) -> f64 {
        self.basis.eigenvalues[self.index]
    }

    pub fn eigenfunction(&self, x: &Point<D>) -> f64 {
        let kx = compute_kernel_vector_for(x, &self.basis.landmarks, self.basis.kernel.as_ref());
        kx.dot(&self.basis.coefficients.column(self.index))
    }
}
