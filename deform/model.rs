use crate::domain::{DiscreteDomain, DomainError, DomainSpec};
use crate::kernel::{KernelError, KernelSpec};
use crate::mean::MeanSpec;
use crate::nystrom::{NystromBasis, NystromConfig, NystromError};
use crate::process::GaussianProcess;
use crate::sampling::SamplingConfig;
use crate::space::{KernelTransformationSpace, SpaceError};
use crate::types::Point1;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the human-readable TOML formats for configuration and
// fitted eigenbases.

/// Everything needed to build a transformation space from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeformConfig {
    pub num_parameters: usize,
    pub domain: DomainSpec,
    pub kernel: KernelSpec,
    #[serde(default)]
    pub mean: MeanSpec,
    #[serde(default)]
    pub nystrom: NystromConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
}

/// A fitted eigenbasis as plain data. Rebuilding a space from a record skips
/// the eigendecomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenBasisRecord {
    /// Number of eigenpairs originally requested.
    pub requested: usize,
    pub landmarks: Vec<f64>,
    /// Retained Gram-matrix eigenvalues, descending.
    pub matrix_eigenvalues: Vec<f64>,
    pub kernel: KernelSpec,
    pub mean: MeanSpec,
    /// `[num_landmarks, num_retained]`, unit eigenvectors in columns.
    pub eigenvectors: Array2<f64>,
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid kernel in configuration: {0}")]
    Kernel(#[from] KernelError),
    #[error("Invalid domain in configuration: {0}")]
    Domain(#[from] DomainError),
    #[error("Stored eigenbasis is invalid: {0}")]
    Nystrom(#[from] NystromError),
    #[error(transparent)]
    Space(#[from] SpaceError),
    #[error(
        "The {0} of this process has no plain-data form (it was derived from data); only spaces built from specs can be saved."
    )]
    NotSerializable(&'static str),
}

impl DeformConfig {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        write_toml(self, path.as_ref())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        Ok(toml::from_str(&toml_string)?)
    }

    pub fn gaussian_process(&self) -> Result<GaussianProcess<1>, ModelError> {
        Ok(GaussianProcess::new(self.mean.build(), self.kernel.build()?))
    }

    pub fn domain(&self) -> Result<DiscreteDomain<1>, ModelError> {
        Ok(self.domain.build()?)
    }

    /// Runs the one expensive step: kernel matrix assembly and eigendecomposition.
    pub fn build_space(&self) -> Result<KernelTransformationSpace, ModelError> {
        Ok(KernelTransformationSpace::new(
            self.domain()?,
            self.num_parameters,
            self.gaussian_process()?,
            &self.nystrom,
        )?)
    }
}

impl EigenBasisRecord {
    pub fn from_space(space: &KernelTransformationSpace) -> Result<Self, ModelError> {
        let process = space.gaussian_process();
        let kernel = process
            .kernel()
            .spec()
            .ok_or(ModelError::NotSerializable("kernel"))?;
        let mean = process
            .mean()
            .spec()
            .ok_or(ModelError::NotSerializable("mean function"))?;
        let basis = space.basis();
        Ok(Self {
            requested: basis.requested(),
            landmarks: basis.landmarks().iter().map(|p| p.x()).collect(),
            matrix_eigenvalues: basis.matrix_eigenvalues().to_vec(),
            kernel,
            mean,
            eigenvectors: basis.eigenvectors().clone(),
        })
    }

    pub fn into_space(self) -> Result<KernelTransformationSpace, ModelError> {
        let process = GaussianProcess::new(self.mean.build(), self.kernel.build()?);
        let landmarks: Vec<Point1> = self.landmarks.into_iter().map(Point1::from).collect();
        let domain = DiscreteDomain::from_points(landmarks.clone())?;
        let basis = NystromBasis::from_parts(
            landmarks,
            process.kernel().clone(),
            Array1::from(self.matrix_eigenvalues),
            self.eigenvectors,
            self.requested,
        )?;
        Ok(KernelTransformationSpace::from_basis(domain, process, basis))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        write_toml(self, path.as_ref())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        Ok(toml::from_str(&toml_string)?)
    }
}

fn write_toml<T: Serialize>(value: &T, path: &Path) -> Result<(), ModelError> {
    let toml_string = toml::to_string_pretty(value)?;
    let mut file = BufWriter::new(fs::File::create(path)?);
    file.write_all(toml_string.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{ParametricTransformation, TransformationSpace};
    use crate::types::{ParameterVector, TrainingData};

    fn config() -> DeformConfig {
        DeformConfig {
            num_parameters: 4,
            domain: DomainSpec {
                start: 0.0,
                end: 1.0,
                num_points: 10,
            },
            kernel: KernelSpec::SquaredExponential {
                variance: 0.2,
                length_scale: 0.25,
            },
            mean: MeanSpec::Zero,
            nystrom: NystromConfig::default(),
            sampling: SamplingConfig::default(),
        }
    }

    #[test]
    fn config_parses_minimal_toml() {
        let text = r#"
            num_parameters = 3

            [domain]
            start = -1.0
            end = 1.0
            num_points = 20

            [kernel]
            type = "squared_exponential"
            variance = 1.0
            length_scale = 0.5
        "#;
        let parsed: DeformConfig = toml::from_str(text).unwrap();
        assert_eq!(parsed.num_parameters, 3);
        assert_eq!(parsed.mean, MeanSpec::Zero);
        assert_eq!(parsed.sampling.jitter, 1e-6);
        assert_eq!(parsed.nystrom.relative_tolerance, 1e-10);
    }

    #[test]
    fn record_round_trip_preserves_the_transformation() {
        let space = config().build_space().unwrap();
        let record = EigenBasisRecord::from_space(&space).unwrap();
        let text = toml::to_string_pretty(&record).unwrap();
        let restored: EigenBasisRecord = toml::from_str(&text).unwrap();
        let rebuilt = restored.into_space().unwrap();

        assert_eq!(rebuilt.parameters_dimensionality(), space.parameters_dimensionality());
        let params = ParameterVector::from(vec![0.3, -1.0, 0.7, 0.2]);
        let a = space.apply(params.clone()).unwrap();
        let b = rebuilt.apply(params).unwrap();
        for x in [0.05, 0.5, 0.93] {
            let p = Point1::from(x);
            assert!((a.evaluate(&p).x() - b.evaluate(&p).x()).abs() < 1e-12);
        }
    }

    #[test]
    fn posterior_spaces_cannot_be_recorded() {
        let config = config();
        let prior = config.gaussian_process().unwrap();
        let training: TrainingData<1> = vec![(Point1::from(0.5), 0.1)].into_iter().collect();
        let posterior = prior.posterior(&training, 1e-4).unwrap();
        let space = KernelTransformationSpace::new(
            config.domain().unwrap(),
            3,
            posterior,
            &config.nystrom,
        )
        .unwrap();
        assert!(matches!(
            EigenBasisRecord::from_space(&space),
            Err(ModelError::NotSerializable("kernel"))
        ));
    }
}
