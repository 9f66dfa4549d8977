//! Gaussian processes: prior definition, posterior conditioning and sampling.

use crate::faer_ndarray::{FaerCholesky, FaerCholeskyFactor, FaerLinalgError};
use crate::kernel::{Kernel, KernelError, KernelSpec, SharedKernel};
use crate::matrix::{compute_kernel_matrix, compute_kernel_vector_for};
use crate::mean::{MeanFunction, MeanSpec, SharedMean, ZeroMean};
use crate::sampling::SamplingConfig;
use crate::types::{Point, TrainingData};
use faer::Side;
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::StandardNormal;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Smallest acceptable reciprocal condition estimate of `K + σ²I`.
const MIN_RECIPROCAL_CONDITION: f64 = f64::EPSILON;

#[derive(Error, Debug)]
pub enum GpError {
    #[error("Posterior conditioning requires at least one training observation.")]
    EmptyTrainingData,

    #[error("Observation noise variance must be non-negative and finite, but was {0}.")]
    InvalidNoiseVariance(f64),

    #[error("Sampling jitter must be non-negative and finite, but was {0}.")]
    InvalidJitter(f64),

    #[error(
        "Training points {first} and {second} coincide; with zero observation noise the kernel matrix is singular."
    )]
    DuplicateTrainingPoint { first: usize, second: usize },

    #[error("Training observation {index} is not finite.")]
    NonFiniteObservation { index: usize },

    #[error(
        "Kernel matrix is numerically singular (reciprocal condition estimate {rcond:e}); increase the observation noise variance."
    )]
    IllConditioned { rcond: f64 },

    #[error(
        "Covariance matrix is not positive definite even after adding jitter {jitter:e}: {source}"
    )]
    NotPositiveDefinite {
        jitter: f64,
        #[source]
        source: FaerLinalgError,
    },

    #[error("Invalid kernel configuration: {0}")]
    Kernel(#[from] KernelError),

    #[error("Linear algebra failure: {0}")]
    Linalg(#[from] FaerLinalgError),
}

/// A Gaussian process over `D`-dimensional points: a mean function paired
/// with a covariance kernel.
///
/// Cloning is cheap; both components are shared and never mutated.
#[derive(Clone, Debug)]
pub struct GaussianProcess<const D: usize> {
    mean: SharedMean<D>,
    kernel: SharedKernel<D>,
}

impl<const D: usize> GaussianProcess<D> {
    pub fn new(mean: SharedMean<D>, kernel: SharedKernel<D>) -> Self {
        Self { mean, kernel }
    }

    pub fn zero_mean(kernel: SharedKernel<D>) -> Self {
        Self::new(Arc::new(ZeroMean), kernel)
    }

    pub fn from_specs(mean: &MeanSpec, kernel: &KernelSpec) -> Result<Self, GpError> {
        Ok(Self::new(mean.build(), kernel.build()?))
    }

    pub fn mean(&self) -> &SharedMean<D> {
        &self.mean
    }

    pub fn kernel(&self) -> &SharedKernel<D> {
        &self.kernel
    }

    /// Conditions the process on noisy observations `y_i = f(x_i) + ε`,
    /// `ε ~ N(0, noise_variance)`.
    ///
    /// The posterior mean is `m(x) + k(x, X) (K + σ²I)⁻¹ (y - m(X))`, which
    /// reduces to `k(x, X) (K + σ²I)⁻¹ y` for a zero prior mean. The posterior
    /// kernel is `k(x, y) - k(x, X) (K + σ²I)⁻¹ k(X, y)`.
    ///
    /// Returns a new process; `self` is left untouched. `K + σ²I` is factored
    /// once and the factor is shared by the posterior mean and kernel.
    pub fn posterior(
        &self,
        training: &TrainingData<D>,
        noise_variance: f64,
    ) -> Result<GaussianProcess<D>, GpError> {
        if training.is_empty() {
            return Err(GpError::EmptyTrainingData);
        }
        if !(noise_variance.is_finite() && noise_variance >= 0.0) {
            return Err(GpError::InvalidNoiseVariance(noise_variance));
        }
        if let Some(index) = training
            .0
            .iter()
            .position(|(p, v)| !(p.is_finite() && v.is_finite()))
        {
            return Err(GpError::NonFiniteObservation { index });
        }
        let points = training.points();
        if noise_variance == 0.0 {
            if let Some((first, second)) = first_duplicate(&points) {
                return Err(GpError::DuplicateTrainingPoint { first, second });
            }
        }

        log::info!(
            "Conditioning Gaussian process on {} observations (noise variance {:e})",
            points.len(),
            noise_variance
        );
        let mut gram = compute_kernel_matrix(&points, self.kernel.as_ref());
        gram.diag_mut().mapv_inplace(|d| d + noise_variance);

        let factor = gram.cholesky(Side::Lower).map_err(|e| match e {
            FaerLinalgError::Cholesky(_) => GpError::IllConditioned { rcond: 0.0 },
            other => GpError::Linalg(other),
        })?;
        let rcond = factor.reciprocal_condition_estimate();
        log::debug!("Posterior kernel matrix reciprocal condition estimate: {:e}", rcond);
        if rcond < MIN_RECIPROCAL_CONDITION {
            return Err(GpError::IllConditioned { rcond });
        }

        let prior_at_points: Array1<f64> = points.iter().map(|p| self.mean.evaluate(p)).collect();
        let residuals = training.values() - &prior_at_points;
        let alpha = factor.solve_vec(&residuals);

        let state = Arc::new(PosteriorState {
            prior: self.clone(),
            points,
            factor,
            alpha,
        });

        Ok(GaussianProcess::new(
            Arc::new(PosteriorMean {
                state: Arc::clone(&state),
            }),
            Arc::new(PosteriorKernel { state }),
        ))
    }

    /// Mean vector and covariance matrix of the process restricted to `points`.
    pub fn marginal(&self, points: &[Point<D>]) -> (Array1<f64>, Array2<f64>) {
        let mean = points.iter().map(|p| self.mean.evaluate(p)).collect();
        let covariance = compute_kernel_matrix(points, self.kernel.as_ref());
        (mean, covariance)
    }

    /// Pointwise predictive mean and variance.
    pub fn predict(&self, points: &[Point<D>]) -> (Array1<f64>, Array1<f64>) {
        let mean = points.iter().map(|p| self.mean.evaluate(p)).collect();
        let variance = points
            .iter()
            .map(|p| self.kernel.evaluate(p, p).max(0.0))
            .collect();
        (mean, variance)
    }

    /// Draws one realisation of the process at `points` using the default jitter.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        points: &[Point<D>],
        rng: &mut R,
    ) -> Result<Array1<f64>, GpError> {
        self.sample_with_config(points, &SamplingConfig::default(), rng)
    }

    /// Draws `μ + L z` with `L Lᵀ = Σ + jitter·I` and `z ~ N(0, I)`.
    ///
    /// A failed factorization is reported, never retried with more jitter.
    pub fn sample_with_config<R: Rng + ?Sized>(
        &self,
        points: &[Point<D>],
        config: &SamplingConfig,
        rng: &mut R,
    ) -> Result<Array1<f64>, GpError> {
        let lower = self.sampling_factor(points, config)?;
        let mean: Array1<f64> = points.iter().map(|p| self.mean.evaluate(p)).collect();
        Ok(draw_with_factor(&mean, &lower, rng))
    }

    /// Cholesky factor of the jittered covariance at `points`.
    pub(crate) fn sampling_factor(
        &self,
        points: &[Point<D>],
        config: &SamplingConfig,
    ) -> Result<Array2<f64>, GpError> {
        let jitter = config.jitter;
        if !(jitter.is_finite() && jitter >= 0.0) {
            return Err(GpError::InvalidJitter(jitter));
        }
        let mut covariance = compute_kernel_matrix(points, self.kernel.as_ref());
        covariance.diag_mut().mapv_inplace(|d| d + jitter);
        let factor = covariance
            .cholesky(Side::Lower)
            .map_err(|source| GpError::NotPositiveDefinite { jitter, source })?;
        Ok(factor.lower())
    }
}

pub(crate) fn draw_with_factor<R: Rng + ?Sized>(
    mean: &Array1<f64>,
    lower: &Array2<f64>,
    rng: &mut R,
) -> Array1<f64> {
    let z: Array1<f64> = (0..mean.len()).map(|_| rng.sample(StandardNormal)).collect();
    mean + &lower.dot(&z)
}

fn first_duplicate<const D: usize>(points: &[Point<D>]) -> Option<(usize, usize)> {
    points.iter().enumerate().find_map(|(i, p)| {
        points[i + 1..]
            .iter()
            .position(|q| q == p)
            .map(|offset| (i, i + 1 + offset))
    })
}

/// Conditioning state shared by a posterior's mean and kernel.
///
/// `K + σ²I` is kept as its Cholesky factor; products with its inverse are
/// triangular solves.
struct PosteriorState<const D: usize> {
    prior: GaussianProcess<D>,
    points: Vec<Point<D>>,
    factor: FaerCholeskyFactor,
    /// `(K + σ²I)⁻¹ (y - m(X))`.
    alpha: Array1<f64>,
}

impl<const D: usize> fmt::Debug for PosteriorState<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PosteriorState")
            .field("prior", &self.prior)
            .field("points", &self.points)
            .field("alpha", &self.alpha)
            .finish_non_exhaustive()
    }
}

impl<const D: usize> PosteriorState<D> {
    fn kernel_vector(&self, x: &Point<D>) -> Array1<f64> {
        compute_kernel_vector_for(x, &self.points, self.prior.kernel.as_ref())
    }
}

#[derive(Debug)]
struct PosteriorMean<const D: usize> {
    state: Arc<PosteriorState<D>>,
}

impl<const D: usize> MeanFunction<D> for PosteriorMean<D> {
    fn evaluate(&self, x: &Point<D>) -> f64 {
        self.state.prior.mean.evaluate(x) + self.state.kernel_vector(x).dot(&self.state.alpha)
    }
}

#[derive(Debug)]
struct PosteriorKernel<const D: usize> {
    state: Arc<PosteriorState<D>>,
}

impl<const D: usize> Kernel<D> for PosteriorKernel<D> {
    fn evaluate(&self, x: &Point<D>, y: &Point<D>) -> f64 {
        let kx = self.state.kernel_vector(x);
        let ky = if x == y {
            kx.clone()
        } else {
            self.state.kernel_vector(y)
        };
        self.state.prior.kernel.evaluate(x, y) - kx.dot(&self.state.factor.solve_vec(&ky))
    }
}
