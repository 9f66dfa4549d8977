use crate::process::{GaussianProcess, GpError, draw_with_factor};
use crate::types::Point;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Numerical settings for drawing from a Gaussian process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Added to the covariance diagonal before the Cholesky factorization.
    pub jitter: f64,
    /// Fixed seed for reproducible draws; `None` seeds from system entropy.
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            jitter: 1e-6,
            seed: None,
        }
    }
}

/// Owns a process, its sampling settings and a random number generator.
pub struct GpSampler<const D: usize> {
    process: GaussianProcess<D>,
    config: SamplingConfig,
    rng: StdRng,
}

impl<const D: usize> GpSampler<D> {
    pub fn new(process: GaussianProcess<D>, config: SamplingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            process,
            config,
            rng,
        }
    }

    pub fn seeded(process: GaussianProcess<D>, seed: u64) -> Self {
        Self::new(
            process,
            SamplingConfig {
                seed: Some(seed),
                ..SamplingConfig::default()
            },
        )
    }

    pub fn process(&self) -> &GaussianProcess<D> {
        &self.process
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// One independent draw at `points`.
    pub fn draw(&mut self, points: &[Point<D>]) -> Result<Array1<f64>, GpError> {
        self.process
            .sample_with_config(points, &self.config, &mut self.rng)
    }

    /// `count` independent draws, one per row. The covariance is factored once.
    pub fn draw_many(&mut self, points: &[Point<D>], count: usize) -> Result<Array2<f64>, GpError> {
        let lower = self.process.sampling_factor(points, &self.config)?;
        let mean: Array1<f64> = points.iter().map(|p| self.process.mean().evaluate(p)).collect();
        let mut draws = Array2::zeros((count, points.len()));
        for mut row in draws.rows_mut() {
            row.assign(&draw_with_factor(&mean, &lower, &mut self.rng));
        }
        log::debug!("Drew {} samples at {} points", count, points.len());
        Ok(draws)
    }
}
