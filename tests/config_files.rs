use gpdeform::kernel::KernelSpec;
use gpdeform::mean::MeanSpec;
use gpdeform::model::{DeformConfig, EigenBasisRecord, ModelError};
use gpdeform::space::{ParametricTransformation, TransformationSpace};
use gpdeform::types::{ParameterVector, Point1};
use std::fs;
use tempfile::tempdir;

const CONFIG: &str = r#"
num_parameters = 5

[domain]
start = 0.0
end = 2.0
num_points = 40

[kernel]
type = "sum"

[kernel.left]
type = "squared_exponential"
variance = 0.1
length_scale = 0.4

[kernel.right]
type = "constant"
value = 0.01

[mean]
type = "constant"
value = 0.25

[sampling]
seed = 17
"#;

#[test]
fn config_file_builds_a_space_and_basis_file_restores_it() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("deform.toml");
    fs::write(&config_path, CONFIG).unwrap();

    let config = DeformConfig::load(&config_path).unwrap();
    assert_eq!(config.mean, MeanSpec::Constant { value: 0.25 });
    assert_eq!(config.sampling.seed, Some(17));
    assert!(matches!(config.kernel, KernelSpec::Sum { .. }));

    let space = config.build_space().unwrap();
    assert_eq!(space.parameters_dimensionality(), 5);

    let basis_path = dir.path().join("basis.toml");
    EigenBasisRecord::from_space(&space)
        .unwrap()
        .save(&basis_path)
        .unwrap();
    let restored = EigenBasisRecord::load(&basis_path)
        .unwrap()
        .into_space()
        .unwrap();

    let params = ParameterVector::from(vec![1.0, -0.5, 0.25, 0.0, 2.0]);
    let original = space.apply(params.clone()).unwrap();
    let reloaded = restored.apply(params).unwrap();
    for x in [0.0, 0.7, 1.33, 2.0] {
        let p = Point1::from(x);
        assert!((original.evaluate(&p).x() - reloaded.evaluate(&p).x()).abs() < 1e-9);
    }
}

#[test]
fn saved_config_loads_back_unchanged() {
    let config: DeformConfig = toml::from_str(CONFIG).unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("copy.toml");
    config.save(&path).unwrap();
    assert_eq!(DeformConfig::load(&path).unwrap(), config);
}

#[test]
fn malformed_files_are_parse_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "num_parameters = \"many\"").unwrap();
    assert!(matches!(
        DeformConfig::load(&path),
        Err(ModelError::TomlParseError(_))
    ));
    assert!(matches!(
        DeformConfig::load(dir.path().join("missing.toml")),
        Err(ModelError::IoError(_))
    ));
}
