//! This library implements [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process) regression
//! on one-dimensional inputs (time series, spectra, ...) in the spirit of
//! [celerite](https://celerite2.readthedocs.io) and [tinygp](https://tinygp.readthedocs.io).
//!
//! For kernels admitting a state space representation of small dimension J, the covariance matrix
//! of N sorted inputs is semiseparable plus diagonal, and is stored as a [SymmQsm]
//! (symmetric quasiseparable matrix) in O(N.J^2) memory instead of O(N^2).
//! Its LDL^T factorization ([QsmFactor]) gives solves, log determinants and (inverse) square root
//! products in O(N.J^3) processing time instead of O(N^3).
//!
//! Kernels are found in the [kernels] module and can be combined with `+` and `*`.
//!
//! GP regression is implemented by [QsGaussianProcess], either built directly from a kernel
//! with fixed hyperparameters or fitted by maximum likelihood through [QsGpParams].
//!
//! ```no_run
//! use qsbox_gp::{kernels::*, QsGaussianProcess, NoiseModel};
//! use linfa::prelude::*;
//! use ndarray::Array1;
//!
//! let x = Array1::linspace(0., 10., 200);
//! let y = x.mapv(|v: f64| v.sin());
//! let kernel = Sho::new(1.0, 1.0, 1.0) + Matern32::new(0.5, 2.0);
//!
//! let gp = QsGaussianProcess::params(kernel)
//!     .noise(NoiseModel::Uniform(1e-2))
//!     .fit(&Dataset::new(x.insert_axis(ndarray::Axis(1)), y))
//!     .expect("GP fitted");
//! let xtest = Array1::linspace(0., 10., 50).insert_axis(ndarray::Axis(1));
//! let mean = gp.predict(&xtest).expect("GP prediction");
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

mod algorithm;
mod errors;
mod factorization;
pub mod kernels;
mod optimization;
mod parameters;
mod qsm;
mod utils;

pub use algorithm::*;
pub use errors::*;
pub use factorization::*;
pub use parameters::*;
pub use qsm::*;
pub use utils::check_sorted;

/// Default number of multistart for hyperparameters optimization
pub const GP_OPTIM_N_START: usize = 10;
/// Minimum of function evaluations for COBYLA optimizer
pub const GP_COBYLA_MIN_EVAL: usize = 25;
/// Maximum of function evaluations for COBYLA optimizer
pub const GP_COBYLA_MAX_EVAL: usize = 1000;
