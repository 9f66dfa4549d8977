#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

pub mod domain;
pub mod faer_ndarray;
pub mod kernel;
pub mod matrix;
pub mod mean;
pub mod model;
pub mod nystrom;
pub mod process;
pub mod sampling;
pub mod space;
pub mod types;

pub use domain::{DiscreteDomain, DomainSpec};
pub use kernel::{Kernel, KernelSpec, SharedKernel};
pub use mean::{MeanFunction, MeanSpec, SharedMean};
pub use model::{DeformConfig, EigenBasisRecord};
pub use nystrom::{EigenPair, NystromApproximator, NystromBasis, NystromConfig};
pub use process::{GaussianProcess, GpError};
pub use sampling::{GpSampler, SamplingConfig};
pub use space::{
    KernelTransformationSpace, ParametricTransformation, Transformation, TransformError,
    TransformationSpace,
};
pub use types::{ParameterVector, Point, Point1, Point2, Point3, TrainingData};
