//! Covariance kernels.
//!
//! A kernel is a symmetric, positive semi-definite function of two points.
//! Concrete kernels are plain value types; sums, products and non-negative
//! scalings wrap shared component kernels and stay symmetric and PSD.

use crate::types::Point;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum KernelError {
    #[error("Length scale must be positive and finite, but was {0}.")]
    InvalidLengthScale(f64),
    #[error("Kernel variance must be non-negative and finite, but was {0}.")]
    InvalidVariance(f64),
    #[error("Scaling factor must be non-negative and finite, but was {0}.")]
    InvalidScale(f64),
    #[error("Polynomial kernel offset must be non-negative and finite, but was {0}.")]
    InvalidOffset(f64),
}

/// Symmetric covariance function over pairs of `D`-dimensional points.
pub trait Kernel<const D: usize>: Send + Sync + Debug {
    fn evaluate(&self, x: &Point<D>, y: &Point<D>) -> f64;

    /// Serializable description, when the kernel has one. Kernels derived from
    /// data (such as a posterior kernel) return `None`.
    fn spec(&self) -> Option<KernelSpec> {
        None
    }
}

pub type SharedKernel<const D: usize> = Arc<dyn Kernel<D>>;

/// `k(x, y) = value` for all pairs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantKernel {
    value: f64,
}

impl ConstantKernel {
    pub fn new(value: f64) -> Result<Self, KernelError> {
        if !(value.is_finite() && value >= 0.0) {
            return Err(KernelError::InvalidVariance(value));
        }
        Ok(Self { value })
    }
}

impl<const D: usize> Kernel<D> for ConstantKernel {
    #[inline]
    fn evaluate(&self, _x: &Point<D>, _y: &Point<D>) -> f64 {
        self.value
    }

    fn spec(&self) -> Option<KernelSpec> {
        Some(KernelSpec::Constant { value: self.value })
    }
}

/// `k(x, y) = variance * exp(-|x - y|^2 / (2 * length_scale^2))`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SquaredExponentialKernel {
    variance: f64,
    length_scale: f64,
}

impl SquaredExponentialKernel {
    pub fn new(variance: f64, length_scale: f64) -> Result<Self, KernelError> {
        if !(variance.is_finite() && variance >= 0.0) {
            return Err(KernelError::InvalidVariance(variance));
        }
        if !(length_scale.is_finite() && length_scale > 0.0) {
            return Err(KernelError::InvalidLengthScale(length_scale));
        }
        Ok(Self {
            variance,
            length_scale,
        })
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }
}

impl<const D: usize> Kernel<D> for SquaredExponentialKernel {
    #[inline]
    fn evaluate(&self, x: &Point<D>, y: &Point<D>) -> f64 {
        let r2 = x.distance_squared(y);
        self.variance * (-r2 / (2.0 * self.length_scale * self.length_scale)).exp()
    }

    fn spec(&self) -> Option<KernelSpec> {
        Some(KernelSpec::SquaredExponential {
            variance: self.variance,
            length_scale: self.length_scale,
        })
    }
}

/// `k(x, y) = (x·y + offset)^degree`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolynomialKernel {
    degree: u32,
    offset: f64,
}

impl PolynomialKernel {
    pub fn new(degree: u32, offset: f64) -> Result<Self, KernelError> {
        if !(offset.is_finite() && offset >= 0.0) {
            return Err(KernelError::InvalidOffset(offset));
        }
        Ok(Self { degree, offset })
    }
}

impl<const D: usize> Kernel<D> for PolynomialKernel {
    #[inline]
    fn evaluate(&self, x: &Point<D>, y: &Point<D>) -> f64 {
        (x.dot(y) + self.offset).powi(self.degree as i32)
    }

    fn spec(&self) -> Option<KernelSpec> {
        Some(KernelSpec::Polynomial {
            degree: self.degree,
            offset: self.offset,
        })
    }
}

#[derive(Clone, Debug)]
pub struct SumKernel<const D: usize> {
    left: SharedKernel<D>,
    right: SharedKernel<D>,
}

impl<const D: usize> SumKernel<D> {
    pub fn new(left: SharedKernel<D>, right: SharedKernel<D>) -> Self {
        Self { left, right }
    }
}

impl<const D: usize> Kernel<D> for SumKernel<D> {
    fn evaluate(&self, x: &Point<D>, y: &Point<D>) -> f64 {
        self.left.evaluate(x, y) + self.right.evaluate(x, y)
    }

    fn spec(&self) -> Option<KernelSpec> {
        Some(KernelSpec::Sum {
            left: Box::new(self.left.spec()?),
            right: Box::new(self.right.spec()?),
        })
    }
}

#[derive(Clone, Debug)]
pub struct ProductKernel<const D: usize> {
    left: SharedKernel<D>,
    right: SharedKernel<D>,
}

impl<const D: usize> ProductKernel<D> {
    pub fn new(left: SharedKernel<D>, right: SharedKernel<D>) -> Self {
        Self { left, right }
    }
}

impl<const D: usize> Kernel<D> for ProductKernel<D> {
    fn evaluate(&self, x: &Point<D>, y: &Point<D>) -> f64 {
        self.left.evaluate(x, y) * self.right.evaluate(x, y)
    }

    fn spec(&self) -> Option<KernelSpec> {
        Some(KernelSpec::Product {
            left: Box::new(self.left.spec()?),
            right: Box::new(self.right.spec()?),
        })
    }
}

#[derive(Clone, Debug)]
pub struct ScaledKernel<const D: usize> {
    factor: f64,
    inner: SharedKernel<D>,
}

impl<const D: usize> ScaledKernel<D> {
    /// Negative factors would break positive semi-definiteness and are rejected.
    pub fn new(factor: f64, inner: SharedKernel<D>) -> Result<Self, KernelError> {
        if !(factor.is_finite() && factor >= 0.0) {
            return Err(KernelError::InvalidScale(factor));
        }
        Ok(Self { factor, inner })
    }
}

impl<const D: usize> Kernel<D> for ScaledKernel<D> {
    fn evaluate(&self, x: &Point<D>, y: &Point<D>) -> f64 {
        self.factor * self.inner.evaluate(x, y)
    }

    fn spec(&self) -> Option<KernelSpec> {
        Some(KernelSpec::Scaled {
            factor: self.factor,
            inner: Box::new(self.inner.spec()?),
        })
    }
}

/// Composition helpers on shared kernels.
pub trait KernelExt<const D: usize> {
    fn add(&self, other: &SharedKernel<D>) -> SharedKernel<D>;
    fn mul(&self, other: &SharedKernel<D>) -> SharedKernel<D>;
    fn scale(&self, factor: f64) -> Result<SharedKernel<D>, KernelError>;
}

impl<const D: usize> KernelExt<D> for SharedKernel<D> {
    fn add(&self, other: &SharedKernel<D>) -> SharedKernel<D> {
        Arc::new(SumKernel::new(Arc::clone(self), Arc::clone(other)))
    }

    fn mul(&self, other: &SharedKernel<D>) -> SharedKernel<D> {
        Arc::new(ProductKernel::new(Arc::clone(self), Arc::clone(other)))
    }

    fn scale(&self, factor: f64) -> Result<SharedKernel<D>, KernelError> {
        Ok(Arc::new(ScaledKernel::new(factor, Arc::clone(self))?))
    }
}

/// Plain-data form of a kernel, as written to configuration and model files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelSpec {
    Constant {
        value: f64,
    },
    SquaredExponential {
        variance: f64,
        length_scale: f64,
    },
    Polynomial {
        degree: u32,
        offset: f64,
    },
    Sum {
        left: Box<KernelSpec>,
        right: Box<KernelSpec>,
    },
    Product {
        left: Box<KernelSpec>,
        right: Box<KernelSpec>,
    },
    Scaled {
        factor: f64,
        inner: Box<KernelSpec>,
    },
}

impl KernelSpec {
    pub fn build<const D: usize>(&self) -> Result<SharedKernel<D>, KernelError> {
        let kernel: SharedKernel<D> = match self {
            KernelSpec::Constant { value } => Arc::new(ConstantKernel::new(*value)?),
            KernelSpec::SquaredExponential {
                variance,
                length_scale,
            } => Arc::new(SquaredExponentialKernel::new(*variance, *length_scale)?),
            KernelSpec::Polynomial { degree, offset } => {
                Arc::new(PolynomialKernel::new(*degree, *offset)?)
            }
            KernelSpec::Sum { left, right } => {
                Arc::new(SumKernel::new(left.build()?, right.build()?))
            }
            KernelSpec::Product { left, right } => {
                Arc::new(ProductKernel::new(left.build()?, right.build()?))
            }
            KernelSpec::Scaled { factor, inner } => {
                Arc::new(ScaledKernel::new(*factor, inner.build()?)?)
            }
        };
        Ok(kernel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Point1, Point2};

    #[test]
    fn squared_exponential_values() {
        let k = SquaredExponentialKernel::new(2.0, 0.5).unwrap();
        let a = Point1::from(0.0);
        let b = Point1::from(0.5);
        assert_eq!(Kernel::<1>::evaluate(&k, &a, &a), 2.0);
        let expected = 2.0 * (-0.5_f64).exp();
        assert!((k.evaluate(&a, &b) - expected).abs() < 1e-15);
        assert_eq!(k.evaluate(&a, &b), k.evaluate(&b, &a));
    }

    #[test]
    fn polynomial_kernel_in_two_dimensions() {
        let k = PolynomialKernel::new(2, 1.0).unwrap();
        let a = Point2::new([1.0, 2.0]);
        let b = Point2::new([3.0, -1.0]);
        // x·y = 1, (1 + 1)^2 = 4
        assert_eq!(k.evaluate(&a, &b), 4.0);
        assert_eq!(k.evaluate(&b, &a), 4.0);
    }

    #[test]
    fn composition_delegates_to_components() {
        let se: SharedKernel<1> = Arc::new(SquaredExponentialKernel::new(1.0, 1.0).unwrap());
        let constant: SharedKernel<1> = Arc::new(ConstantKernel::new(0.5).unwrap());
        let combined = se.add(&constant).mul(&constant).scale(4.0).unwrap();

        let a = Point1::from(0.3);
        let b = Point1::from(-0.7);
        let expected = 4.0 * (se.evaluate(&a, &b) + 0.5) * 0.5;
        assert!((combined.evaluate(&a, &b) - expected).abs() < 1e-15);
        assert_eq!(combined.evaluate(&a, &b), combined.evaluate(&b, &a));
    }

    #[test]
    fn invalid_hyperparameters_are_rejected() {
        assert_eq!(
            SquaredExponentialKernel::new(1.0, 0.0),
            Err(KernelError::InvalidLengthScale(0.0))
        );
        assert_eq!(
            SquaredExponentialKernel::new(-1.0, 1.0),
            Err(KernelError::InvalidVariance(-1.0))
        );
        let constant: SharedKernel<1> = Arc::new(ConstantKernel::new(1.0).unwrap());
        assert!(matches!(
            constant.scale(-2.0),
            Err(KernelError::InvalidScale(f)) if f == -2.0
        ));
    }

    #[test]
    fn spec_round_trip_rebuilds_equivalent_kernel() {
        let spec = KernelSpec::Scaled {
            factor: 3.0,
            inner: Box::new(KernelSpec::Sum {
                left: Box::new(KernelSpec::SquaredExponential {
                    variance: 1.0,
                    length_scale: 2.0,
                }),
                right: Box::new(KernelSpec::Constant { value: 0.25 }),
            }),
        };
        let kernel = spec.build::<1>().unwrap();
        assert_eq!(kernel.spec(), Some(spec.clone()));

        let text = toml::to_string(&spec).unwrap();
        let parsed: KernelSpec = toml::from_str(&text).unwrap();
        assert_eq!(parsed, spec);
    }
}
