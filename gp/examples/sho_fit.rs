use linfa::prelude::*;
use ndarray::{concatenate, Array, Array1, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use qsbox_gp::kernels::{Matern32, Sho};
use qsbox_gp::{NoiseModel, QsGaussianProcess};
use rand_xoshiro::Xoshiro256Plus;

// A quasi periodic signal on top of a slow trend
fn signal(x: &Array1<f64>) -> Array1<f64> {
    x.mapv(|v| (2. * v).sin() * (-0.05 * v).exp() + 0.1 * v)
}

fn main() {
    env_logger::init();

    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let xt = Array::linspace(0., 20., 500);
    let noise = Array::random_using(500, Normal::new(0., 0.1).unwrap(), &mut rng);
    let yt = signal(&xt) + noise;

    println!("Fit SHO + Matern32 GP on {} noisy observations", xt.len());
    let gp = QsGaussianProcess::params(Sho::new(1.0, 1.0, 2.0) + Matern32::new(1.0, 5.0))
        .noise(NoiseModel::Uniform(0.01))
        .fit(&Dataset::new(xt.insert_axis(Axis(1)), yt))
        .expect("GP fitting");
    println!("{gp}");

    let xtest = Array::linspace(0., 25., 26);
    let ytest = signal(&xtest);
    let xtest = xtest.insert_axis(Axis(1));
    let (ypred, yvar) = gp.predict_valvar(&xtest).expect("GP prediction");
    let ysigma = yvar.mapv(f64::sqrt);

    println!("Prediction errors (x, err(x), sigma(x))");
    println!(
        "{}",
        concatenate![
            Axis(1),
            xtest,
            (ypred - ytest).insert_axis(Axis(1)),
            ysigma.insert_axis(Axis(1))
        ]
    );
}
