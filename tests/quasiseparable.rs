use approx::{assert_abs_diff_eq, assert_relative_eq};
use linfa::prelude::*;
use linfa_linalg::{cholesky::*, triangular::*};
use ndarray::{array, Array, Array1, Array2, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::{StandardNormal, Uniform};
use ndarray_rand::RandomExt;
use qsbox::prelude::*;
use rand_xoshiro::Xoshiro256Plus;

const N: usize = 46;

fn sorted_inputs(n: usize, seed: u64) -> Array1<f64> {
    let mut rng = Xoshiro256Plus::seed_from_u64(seed);
    let mut x = Array::random_using(n, Uniform::new(0., 20.), &mut rng).to_vec();
    x.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Array1::from_vec(x)
}

fn kernel() -> Sum<Sho<f64>, Scale<f64, Matern32<f64>>> {
    Sho::new(1.2, 1.7, 4.0) + Scale::new(Matern32::new(1.0, 2.5), 0.3)
}

fn dense_log_likelihood(k: &Array2<f64>, r: &Array1<f64>) -> f64 {
    let l = k.cholesky().unwrap();
    let logdet = 2. * l.diag().mapv(f64::ln).sum();
    let z = l
        .solve_triangular(&r.clone().insert_axis(Axis(1)), UPLO::Lower)
        .unwrap();
    let quad = z.column(0).dot(&z.column(0));
    -0.5 * (quad + logdet + r.len() as f64 * (2. * std::f64::consts::PI).ln())
}

#[test]
fn test_log_likelihood_against_dense_cholesky() {
    let x = sorted_inputs(N, 42);
    let y = x.mapv(|v| (0.7 * v).sin() + 0.05 * v);
    let mut rng = Xoshiro256Plus::seed_from_u64(7);
    let noise = Array::random_using(N, Uniform::new(0.01, 0.1), &mut rng);
    let mean = 0.2;

    let gp = QsGaussianProcess::new(kernel(), &x, &y, &noise, mean).unwrap();

    let k = kernel().covariance(&x, &x) + Array2::from_diag(&noise);
    let expected = dense_log_likelihood(&k, &y.mapv(|v| v - mean));
    assert_relative_eq!(gp.log_likelihood(), expected, max_relative = 1e-6);
}

#[test]
fn test_solve_apply_and_log_determinant() {
    let x = sorted_inputs(N, 3);
    let noise = Array1::from_elem(N, 0.05);
    let qsm = kernel().to_symm_qsm(&x).unwrap().with_diagonal(&noise).unwrap();
    let dense = qsm.to_dense();
    let factor = qsm.factorize().unwrap();

    let mut rng = Xoshiro256Plus::seed_from_u64(11);
    let b = Array::random_using((N, 3), StandardNormal, &mut rng);
    let z = factor.solve(&b).unwrap();
    assert_abs_diff_eq!(factor.matrix().apply(&z).unwrap(), b, epsilon = 1e-8);
    assert_abs_diff_eq!(dense.dot(&z), b, epsilon = 1e-8);

    let chol = dense.cholesky().unwrap();
    let logdet = 2. * chol.diag().mapv(f64::ln).sum();
    assert_relative_eq!(factor.log_determinant(), logdet, max_relative = 1e-8);
}

#[test]
fn test_prediction_interpolates_as_noise_vanishes() {
    let x = Array::linspace(0., 15., N);
    let y = x.mapv(|v: f64| (0.7 * v).cos());
    let noise = Array1::from_elem(N, 1e-9);
    let gp = QsGaussianProcess::new(kernel(), &x, &y, &noise, 0.).unwrap();
    let (mean, var) = gp.predict_valvar(&x.clone().insert_axis(Axis(1))).unwrap();
    assert_abs_diff_eq!(mean, y, epsilon = 1e-4);
    assert!(var.iter().all(|v| *v >= 0. && *v < 1e-4));
}

#[test]
fn test_deterministic_results() {
    let x = sorted_inputs(N, 5);
    let y = x.mapv(f64::sin);
    let noise = Array1::from_elem(N, 0.1);
    let xtest = array![[3.1], [0.2], [17.5]];
    let gp1 = QsGaussianProcess::new(kernel(), &x, &y, &noise, 0.).unwrap();
    let gp2 = QsGaussianProcess::new(kernel(), &x, &y, &noise, 0.).unwrap();
    assert_eq!(gp1.log_likelihood(), gp2.log_likelihood());
    assert_eq!(gp1.predict(&xtest).unwrap(), gp2.predict(&xtest).unwrap());
    assert_eq!(gp1.predict_var(&xtest).unwrap(), gp2.predict_var(&xtest).unwrap());
}

#[test]
fn test_single_point() {
    let kernel = Matern52::new(2.0, 1.0);
    let gp = QsGaussianProcess::new(kernel, &array![1.0], &array![0.5], &array![0.25], 0.).unwrap();
    // K = 4 + 0.25
    let expected = -0.5 * (0.25 / 4.25 + 4.25f64.ln() + (2. * std::f64::consts::PI).ln());
    assert_relative_eq!(gp.log_likelihood(), expected, max_relative = 1e-12);
    let mean = gp.predict(&array![[1.0]]).unwrap();
    assert_relative_eq!(mean[0], 4. / 4.25 * 0.5, max_relative = 1e-12);
}

#[test]
fn test_unsorted_inputs_are_rejected() {
    let x = array![0.0, 1.0, 0.5, 2.0];
    let res = QsGaussianProcess::new(
        Exp::new(1.0, 1.0),
        &x,
        &Array1::zeros(4),
        &Array1::from_elem(4, 0.1),
        0.,
    );
    assert!(matches!(res, Err(GpError::DomainError(_))));
    assert!(matches!(
        Exp::new(1.0, 1.0).to_symm_qsm(&x),
        Err(GpError::DomainError(_))
    ));
}

#[test]
fn test_non_positive_definite_is_reported() {
    let x = Array::linspace(0., 1., 5);
    let qsm = Exp::new(1.0, 1.0).to_symm_qsm(&x).unwrap().scale(-1.0);
    match qsm.factorize() {
        Err(GpError::NumericalError { index, pivot }) => {
            assert_eq!(index, 0);
            assert!(pivot <= 0.);
        }
        other => panic!("expected a numerical error, got {other:?}"),
    }
}

#[test]
fn test_fit_with_linfa() {
    let x = Array::linspace(0., 10., 60);
    let y = x.mapv(|v: f64| (1.3 * v).sin());
    let gp = QsGaussianProcess::params(Matern32::new(1.0, 1.0))
        .noise(NoiseModel::Uniform(1e-3))
        .n_start(2)
        .fit(&Dataset::new(x.insert_axis(Axis(1)), y))
        .expect("GP fit error");
    let pred = gp.predict(&array![[2.0], [7.5]]).unwrap();
    assert_abs_diff_eq!(pred, array![(2.6f64).sin(), (9.75f64).sin()], epsilon = 5e-2);
}
