use crate::types::Point;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Mean function of a Gaussian process.
pub trait MeanFunction<const D: usize>: Send + Sync + Debug {
    fn evaluate(&self, x: &Point<D>) -> f64;

    fn spec(&self) -> Option<MeanSpec> {
        None
    }
}

pub type SharedMean<const D: usize> = Arc<dyn MeanFunction<D>>;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ZeroMean;

impl<const D: usize> MeanFunction<D> for ZeroMean {
    #[inline]
    fn evaluate(&self, _x: &Point<D>) -> f64 {
        0.0
    }

    fn spec(&self) -> Option<MeanSpec> {
        Some(MeanSpec::Zero)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantMean(pub f64);

impl<const D: usize> MeanFunction<D> for ConstantMean {
    #[inline]
    fn evaluate(&self, _x: &Point<D>) -> f64 {
        self.0
    }

    fn spec(&self) -> Option<MeanSpec> {
        Some(MeanSpec::Constant { value: self.0 })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeanSpec {
    #[default]
    Zero,
    Constant {
        value: f64,
    },
}

impl MeanSpec {
    pub fn build<const D: usize>(&self) -> SharedMean<D> {
        match *self {
            MeanSpec::Zero => Arc::new(ZeroMean),
            MeanSpec::Constant { value } => Arc::new(ConstantMean(value)),
        }
    }
}
