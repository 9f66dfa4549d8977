use approx::assert_abs_diff_eq;
use gpdeform::domain::DiscreteDomain;
use gpdeform::kernel::{SharedKernel, SquaredExponentialKernel};
use gpdeform::nystrom::NystromConfig;
use gpdeform::process::GaussianProcess;
use gpdeform::space::{
    KernelTransformationSpace, ParametricTransformation, TransformError, TransformationSpace,
};
use gpdeform::types::{ParameterVector, Point1, TrainingData};
use std::sync::Arc;

fn prior() -> GaussianProcess<1> {
    let kernel: SharedKernel<1> = Arc::new(SquaredExponentialKernel::new(0.05, 0.2).unwrap());
    GaussianProcess::zero_mean(kernel)
}

fn space(num_parameters: usize) -> KernelTransformationSpace {
    let domain = DiscreteDomain::uniform(0.0, 1.0, 30).unwrap();
    KernelTransformationSpace::new(domain, num_parameters, prior(), &NystromConfig::default())
        .unwrap()
}

#[test]
fn identity_parameters_leave_points_fixed() {
    let space = space(6);
    assert_eq!(space.parameters_dimensionality(), 6);
    let t = space.apply(space.identity_parameters()).unwrap();
    let points: Vec<Point1> = (0..11).map(|i| Point1::from(i as f64 / 10.0)).collect();
    for (p, q) in points.iter().zip(t.evaluate_many(&points)) {
        assert_abs_diff_eq!(p.x(), q.x(), epsilon = 1e-14);
    }
}

#[test]
fn evaluation_is_linear_in_the_parameters() {
    let space = space(5);
    let a = ParameterVector::from(vec![0.4, -0.1, 1.2, 0.0, -0.8]);
    let b = ParameterVector::from(vec![-1.0, 0.3, 0.0, 0.6, 0.2]);
    let sum = ParameterVector::from(&*a + &*b);

    let ta = space.apply(a).unwrap();
    let tb = space.apply(b).unwrap();
    let tsum = space.apply(sum).unwrap();
    for x in [0.0, 0.13, 0.5, 0.77, 1.0] {
        let p = Point1::from(x);
        assert_abs_diff_eq!(
            tsum.displacement(&p),
            ta.displacement(&p) + tb.displacement(&p),
            epsilon = 1e-12
        );
    }
}

#[test]
fn parameter_derivative_matches_finite_differences() {
    let space = space(4);
    let base = ParameterVector::from(vec![0.2, -0.5, 0.1, 0.9]);
    let t = space.apply(base.clone()).unwrap();
    let x = Point1::from(0.42);
    let derivative = t.derivative_wrt_parameters(&x);

    let h = 1e-6;
    for i in 0..4 {
        let mut bumped = base.0.clone();
        bumped[i] += h;
        let tb = space.apply(ParameterVector::from(bumped)).unwrap();
        let fd = (tb.evaluate(&x).x() - t.evaluate(&x).x()) / h;
        assert_abs_diff_eq!(fd, derivative[i], epsilon = 1e-6);
    }
}

#[test]
fn posterior_space_follows_the_observations() {
    let training: TrainingData<1> = vec![(Point1::from(0.5), 0.1)].into_iter().collect();
    let posterior = prior().posterior(&training, 1e-8).unwrap();
    let domain = DiscreteDomain::uniform(0.0, 1.0, 21).unwrap();
    let space =
        KernelTransformationSpace::new(domain, 4, posterior, &NystromConfig::default()).unwrap();
    let t = space.apply(space.identity_parameters()).unwrap();
    assert_abs_diff_eq!(t.evaluate(&Point1::from(0.5)).x(), 0.6, epsilon = 1e-6);
}

#[test]
fn invalid_parameters_are_rejected() {
    let space = space(3);
    assert_eq!(
        space.apply(ParameterVector::zeros(5)).unwrap_err(),
        TransformError::DimensionMismatch {
            expected: 3,
            found: 5
        }
    );
    assert_eq!(
        space
            .apply(ParameterVector::from(vec![f64::NAN, 0.0, 0.0]))
            .unwrap_err(),
        TransformError::NonFiniteParameter { index: 0 }
    );
}

#[test]
fn inverse_and_spatial_derivative_are_reported_as_errors() {
    let space = space(2);
    let t = space.apply(ParameterVector::from(vec![1.0, 1.0])).unwrap();
    assert!(matches!(
        t.inverse(),
        Err(TransformError::UnsupportedOperation { .. })
    ));
    assert!(matches!(
        t.spatial_derivative(&Point1::from(0.3)),
        Err(TransformError::NotImplemented { .. })
    ));
}
