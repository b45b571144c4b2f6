//! `qsbox` is a toolbox for scalable gaussian process regression on one-dimensional inputs.
//!
//! It gathers:
//! * [gp]: quasiseparable covariance matrices, their O(N) factorization and the
//!   [QsGaussianProcess](gp::QsGaussianProcess) regression model built on top of them.
//!
//! The [prelude] module brings the most used types in scope.
//!
//! ```no_run
//! use qsbox::prelude::*;
//! use ndarray::{Array1, Axis};
//!
//! let x = Array1::linspace(0., 20., 1000);
//! let y = x.mapv(|v: f64| (0.5 * v).sin());
//! let noise = Array1::from_elem(1000, 1e-2);
//!
//! let gp = QsGaussianProcess::new(Sho::new(1.0, 0.5, 2.0), &x, &y, &noise, 0.)
//!     .expect("GP built");
//! println!("log likelihood = {}", gp.log_likelihood());
//! let xtest = Array1::linspace(0., 25., 100).insert_axis(Axis(1));
//! let (mean, variance) = gp.predict_valvar(&xtest).expect("GP prediction");
//! ```
#![warn(missing_docs)]

pub use qsbox_gp as gp;

/// Most used types and traits
pub mod prelude {
    pub use qsbox_gp::kernels::{
        Cosine, Exp, Matern32, Matern52, Product, QuasisepKernel, Scale, Sho, Sum,
    };
    pub use qsbox_gp::{
        GpError, HyperTuning, NoiseModel, QsGaussianProcess, QsGpParams, QsGpVariancePredictor,
        QsmFactor, SymmQsm,
    };
}
