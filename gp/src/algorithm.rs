use crate::errors::{GpError, Result};
use crate::factorization::QsmFactor;
use crate::kernels::QuasisepKernel;
use crate::optimization::{
    cobyla_max_eval, into_f64, log_likelihood_gradient, optimize_params, prepare_multistart,
    CobylaParams,
};
use crate::parameters::{QsGpParams, QsGpValidParams};
use crate::utils::{as_column, check_sorted, MergedInputs, Origin};

use linfa::prelude::{DatasetBase, Fit, Float, PredictInplace};
use log::{debug, warn};
use ndarray::{Array, Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rayon::prelude::*;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Number of test points above which a full posterior covariance request is logged
const PREDICT_COV_WARNING: usize = 2000;

/// Gaussian process regression on one-dimensional inputs with a quasiseparable kernel.
///
/// The observations are modelled as `y(x) = mean + f(x) + e` where `f` is a zero mean
/// gaussian process with covariance given by a [QuasisepKernel] and `e` an independent
/// gaussian noise of known variance (per observation).
///
/// Training inputs have to be sorted in ascending order. All the training work
/// (building the covariance representation, its factorization and the solve for the
/// weights) is done in O(N J^2) where J is the kernel state dimension, instead of
/// the O(N^3) of a dense Cholesky factorization.
///
/// # Prediction
///
/// * the posterior mean at M test points costs O((N + M) J^2) thanks to two sweeps
///   over training and test inputs merged in ascending order,
/// * the posterior variance costs an extra O(N J^2) per test point,
/// * the full posterior covariance costs O(N M J + N M^2) and O(M^2) memory:
///   only request it for a small number of test points.
///
/// # Example
///
/// ```no_run
/// use qsbox_gp::{kernels::{Matern32, Sho}, QsGaussianProcess};
/// use linfa::prelude::*;
/// use ndarray::{Array, Array1, Axis};
///
/// let xt = Array::linspace(0., 10., 50);
/// let yt = xt.mapv(|v: f64| (2. * v).sin());
/// let xt = xt.insert_axis(Axis(1));
///
/// let gp = QsGaussianProcess::params(Sho::new(1.0, 2.0, 3.0) + Matern32::new(0.1, 1.0))
///     .noise(qsbox_gp::NoiseModel::Uniform(1e-4))
///     .fit(&Dataset::new(xt, yt))
///     .expect("GP fitted");
///
/// let xtest = Array::linspace(0., 10., 200).insert_axis(Axis(1));
/// let (mean, variance) = gp.predict_valvar(&xtest).expect("GP prediction");
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, K: Serialize",
        deserialize = "F: Deserialize<'de>, K: Deserialize<'de>"
    ))
)]
pub struct QsGaussianProcess<F: Float, K: QuasisepKernel<F>> {
    /// Covariance kernel
    kernel: K,
    /// Constant mean
    mean: F,
    /// Training inputs (sorted)
    xtrain: Array1<F>,
    /// Training outputs
    ytrain: Array1<F>,
    /// Diagonal added to the kernel covariance matrix (noise variances and nugget)
    noise: Array1<F>,
    /// Factorization of the training covariance matrix
    factor: QsmFactor<F>,
    /// Weights `K^-1 (y - mean)`
    alpha: Array1<F>,
    /// Log likelihood of the training data
    likelihood: F,
}

impl<F: Float, K: QuasisepKernel<F>> fmt::Display for QsGaussianProcess<F, K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "QsGP(kernel={}, mean={}, likelihood={})",
            self.kernel, self.mean, self.likelihood
        )
    }
}

impl<F: Float, K: QuasisepKernel<F>> QsGaussianProcess<F, K> {
    /// Gp parameters contructor
    pub fn params(kernel: K) -> QsGpParams<F, K> {
        QsGpParams::new(kernel)
    }

    /// Condition the process given by `kernel` and `mean` on observations `y`
    /// at sorted inputs `x` with noise variances `noise`.
    ///
    /// # Errors
    ///
    /// * [GpError::DomainError] when `x` is not sorted, checked before any computation
    /// * [GpError::ShapeError] when `x`, `y` and `noise` lengths differ
    /// * [GpError::NumericalError] when the covariance matrix is not positive definite
    pub fn new(
        kernel: K,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
        noise: &ArrayBase<impl Data<Elem = F>, Ix1>,
        mean: F,
    ) -> Result<Self> {
        check_sorted(x)?;
        if y.len() != x.len() || noise.len() != x.len() {
            return Err(GpError::ShapeError(format!(
                "inputs ({}), outputs ({}) and noise ({}) lengths should be equal",
                x.len(),
                y.len(),
                noise.len()
            )));
        }
        let factor = kernel.to_symm_qsm(x)?.with_diagonal(noise)?.factorize()?;
        let residuals = y.mapv(|v| v - mean);
        let alpha = factor.solve_vec(&residuals)?;
        let n = F::cast(x.len());
        let two_pi = F::cast(2. * std::f64::consts::PI);
        let likelihood = -F::cast(0.5)
            * (residuals.dot(&alpha) + factor.log_determinant() + n * two_pi.ln());
        Ok(QsGaussianProcess {
            kernel,
            mean,
            xtrain: x.to_owned(),
            ytrain: y.to_owned(),
            noise: noise.to_owned(),
            factor,
            alpha,
            likelihood,
        })
    }

    /// Kernel of the process
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Constant mean of the process
    pub fn mean(&self) -> F {
        self.mean
    }

    /// Training inputs
    pub fn xtrain(&self) -> &Array1<F> {
        &self.xtrain
    }

    /// Training outputs
    pub fn ytrain(&self) -> &Array1<F> {
        &self.ytrain
    }

    /// Factorization of the training covariance matrix (noise included)
    pub fn factor(&self) -> &QsmFactor<F> {
        &self.factor
    }

    /// Gaussian log likelihood of the training outputs
    /// `-0.5 * (r^T K^-1 r + log|K| + N log(2 pi))` with `r = y - mean`
    pub fn log_likelihood(&self) -> F {
        self.likelihood
    }

    /// Gradient of the log likelihood with respect to the natural logarithm of the
    /// kernel parameters (in [QuasisepKernel::parameters] order), computed with
    /// central finite differences.
    pub fn log_likelihood_gradient(&self) -> Result<Array1<F>> {
        let params = self.kernel.parameters();
        if let Some(p) = params.iter().find(|p| !(**p > F::zero())) {
            return Err(GpError::InvalidValueError(format!(
                "log likelihood gradient needs positive kernel parameters, got {p}"
            )));
        }
        log_likelihood_gradient(&params, |params| {
            let kernel = self.kernel.reparameterize(params)?;
            let gp =
                QsGaussianProcess::new(kernel, &self.xtrain, &self.ytrain, &self.noise, self.mean)?;
            Ok(gp.likelihood)
        })
    }

    /// Predict the posterior mean at n given `x` points specified as a (n, 1) matrix,
    /// in any order. Returns n values as a vector (n,).
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        let xtest = as_column(x)?;
        let merged = MergedInputs::new(&self.xtrain, &xtest)?;
        let qsm = self.kernel.to_symm_qsm(&merged.coords)?;
        let total = merged.coords.len();
        let mut mu = Array1::from_elem(xtest.len(), F::zero());

        // contributions of training points located before each test point
        let mut f = Array1::<F>::zeros(qsm.rank());
        for (m, origin) in merged.origins.iter().enumerate() {
            if m > 0 {
                f = qsm.a(m).dot(&f);
            }
            match *origin {
                Origin::Test(k) => mu[k] += qsm.p().row(m).dot(&f),
                Origin::Train(j) => f.scaled_add(self.alpha[j], &qsm.q().row(m)),
            }
        }

        // contributions of training points located after each test point
        let mut g = Array1::<F>::zeros(qsm.rank());
        for (m, origin) in merged.origins.iter().enumerate().rev() {
            if m + 1 < total {
                g = qsm.a(m + 1).t().dot(&g);
            }
            match *origin {
                Origin::Test(k) => mu[k] += qsm.q().row(m).dot(&g),
                Origin::Train(j) => g.scaled_add(self.alpha[j], &qsm.p().row(m)),
            }
        }
        Ok(mu.mapv(|v| v + self.mean))
    }

    /// Predict the posterior variance of the latent process (noise excluded)
    /// at n given `x` points specified as a (n, 1) matrix. Returns a vector (n,).
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        let xtest = as_column(x)?;
        if let Some(i) = xtest.iter().position(|v| !v.is_finite()) {
            return Err(GpError::DomainError(format!(
                "test coordinate at position {i} is not finite"
            )));
        }
        let vars = xtest
            .as_slice()
            .ok_or_else(|| GpError::InvalidValueError("test inputs not contiguous".to_string()))?
            .par_iter()
            .map(|&xs| -> Result<F> {
                let kstar = self
                    .xtrain
                    .mapv(|xt| self.kernel.value(xt, xs))
                    .insert_axis(Axis(1));
                let z = self.factor.apply_inverse_sqrt(&kstar)?;
                let var = self.kernel.diag(xs) - z.column(0).dot(&z.column(0));
                Ok(if var < F::zero() { F::zero() } else { var })
            })
            .collect::<Result<Vec<F>>>()?;
        Ok(Array1::from_vec(vars))
    }

    /// Predict both posterior mean and variance at n given `x` points
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array1<F>)> {
        Ok((self.predict(x)?, self.predict_var(x)?))
    }

    /// Predict the full posterior covariance matrix (n, n) of the latent process
    /// at n given `x` points.
    ///
    /// **Warning**: time and memory grow with the square of the number of test points.
    pub fn predict_cov(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        let xtest = as_column(x)?;
        if xtest.len() > PREDICT_COV_WARNING {
            warn!(
                "Full posterior covariance requested at {} points, consider predict_var",
                xtest.len()
            );
        }
        let kstar = self.kernel.covariance(&self.xtrain, &xtest);
        let z = self.factor.apply_inverse_sqrt(&kstar)?;
        let mut cov = self.kernel.covariance(&xtest, &xtest);
        cov -= &z.t().dot(&z);
        Ok(cov)
    }

    /// Draw `n_traj` trajectories of the observations prior `N(mean, K + noise)`
    /// at the training inputs. Returns a (N, n_traj) matrix.
    pub fn sample_prior<R: Rng>(&self, n_traj: usize, rng: &mut R) -> Result<Array2<F>> {
        let z = Array::random_using((self.xtrain.len(), n_traj), StandardNormal, rng)
            .mapv(|v: f64| F::cast(v));
        let samples = self.factor.apply_sqrt(&z)?;
        Ok(samples.mapv(|v| v + self.mean))
    }
}

impl<F, D, K> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for QsGaussianProcess<F, K>
where
    F: Float,
    D: Data<Elem = F>,
    K: QuasisepKernel<F>,
{
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<F>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );

        let values = self.predict(x).expect("GP Prediction");
        *y = values;
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros((x.nrows(),))
    }
}

/// Gausssian Process adaptator to implement `linfa::Predict` trait for variance prediction.
pub struct QsGpVariancePredictor<'a, F, K>(pub &'a QsGaussianProcess<F, K>)
where
    F: Float,
    K: QuasisepKernel<F>;

impl<F, D, K> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for QsGpVariancePredictor<'_, F, K>
where
    F: Float,
    D: Data<Elem = F>,
    K: QuasisepKernel<F>,
{
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<F>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );

        let values = self.0.predict_var(x).expect("GP Prediction");
        *y = values;
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros(x.nrows())
    }
}

impl<F: Float, K: QuasisepKernel<F>, D: Data<Elem = F>>
    Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError> for QsGpValidParams<F, K>
{
    type Object = QsGaussianProcess<F, K>;

    /// Fit kernel parameters using maximum likelihood
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let x = as_column(dataset.records())?;
        let y = dataset.targets().to_owned();
        check_sorted(&x)?;
        let nugget = self.nugget();
        let noise = self.noise().diagonal(x.len())?.mapv(|v| v + nugget);

        let kernel0 = self.kernel();
        let params0 = Array1::from_vec(kernel0.parameters());
        let kernel = match self.tuning().bounds(params0.len())? {
            None => kernel0.clone(),
            Some(bounds) => {
                let base: f64 = 10.;
                let objfn = |p: &[f64], _gradient: Option<&mut [f64]>, _params: &mut ()| -> f64 {
                    // optimizer may return nan values
                    if p.iter().any(|v| v.is_nan()) {
                        return f64::INFINITY;
                    }
                    let params: Vec<F> = p.iter().map(|v| F::cast(base.powf(*v))).collect();
                    match kernel0
                        .reparameterize(&params)
                        .and_then(|k| QsGaussianProcess::new(k, &x, &y, &noise, self.mean()))
                    {
                        Ok(gp) => {
                            let lkh = into_f64(&gp.likelihood);
                            if lkh.is_finite() {
                                -lkh
                            } else {
                                f64::INFINITY
                            }
                        }
                        Err(_) => f64::INFINITY,
                    }
                };

                let (params_inits, bounds) = prepare_multistart(self.n_start(), &params0, &bounds);
                debug!(
                    "Optimize with multistart params = {params_inits:?} and bounds = {bounds:?}"
                );
                let now = Instant::now();
                let opt_params = (0..params_inits.nrows())
                    .into_par_iter()
                    .map(|i| {
                        optimize_params(
                            objfn,
                            &params_inits.row(i).to_owned(),
                            &bounds,
                            CobylaParams {
                                maxeval: cobyla_max_eval(params_inits.ncols(), self.max_eval()),
                                ..CobylaParams::default()
                            },
                        )
                    })
                    .reduce(
                        || (f64::INFINITY, Array::ones((params_inits.ncols(),))),
                        |a, b| if b.0 < a.0 { b } else { a },
                    );
                debug!("elapsed optim = {:?}", now.elapsed().as_millis());
                if !opt_params.0.is_finite() {
                    return Err(GpError::InvalidValueError(format!(
                        "no valid likelihood found while optimizing parameters of {kernel0}"
                    )));
                }
                let params: Vec<F> = opt_params.1.iter().map(|v| F::cast(base.powf(*v))).collect();
                kernel0.reparameterize(&params)?
            }
        };
        QsGaussianProcess::new(kernel, &x, &y, &noise, self.mean())
    }
}
