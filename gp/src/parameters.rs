use crate::errors::{GpError, Result};
use crate::kernels::QuasisepKernel;
use crate::{GP_COBYLA_MAX_EVAL, GP_COBYLA_MIN_EVAL, GP_OPTIM_N_START};
use linfa::{Float, ParamGuard};
use ndarray::Array1;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Observation noise variances added to the covariance diagonal
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub enum NoiseModel<F: Float> {
    /// Same variance for every observation
    Uniform(F),
    /// One variance per observation, in training input order
    PerPoint(Array1<F>),
}

impl<F: Float> Default for NoiseModel<F> {
    fn default() -> Self {
        NoiseModel::Uniform(F::zero())
    }
}

impl<F: Float> NoiseModel<F> {
    /// Noise diagonal for `n` observations
    pub fn diagonal(&self, n: usize) -> Result<Array1<F>> {
        match self {
            NoiseModel::Uniform(v) => Ok(Array1::from_elem(n, *v)),
            NoiseModel::PerPoint(v) if v.len() == n => Ok(v.clone()),
            NoiseModel::PerPoint(v) => Err(GpError::ShapeError(format!(
                "noise of length {} given for {n} observations",
                v.len()
            ))),
        }
    }

    fn check(&self) -> Result<()> {
        let valid = |v: &F| *v >= F::zero() && v.is_finite();
        let ok = match self {
            NoiseModel::Uniform(v) => valid(v),
            NoiseModel::PerPoint(v) => v.iter().all(valid),
        };
        if ok {
            Ok(())
        } else {
            Err(GpError::InvalidValueError(
                "noise variances should be finite and non negative".to_string(),
            ))
        }
    }
}

/// An enum to represent kernel hyperparameters tuning
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub enum HyperTuning<F: Float> {
    /// Kernel parameters are used as given
    Fixed,
    /// Kernel parameters are optimized by maximum likelihood between bounds (lower, upper),
    /// starting from the kernel current parameters.
    /// A single pair of bounds applies to every parameter.
    Full {
        /// Bounds in natural units, strictly positive
        bounds: Vec<(F, F)>,
    },
}

impl<F: Float> Default for HyperTuning<F> {
    fn default() -> Self {
        HyperTuning::Full {
            bounds: vec![(
                F::cast(HyperTuning::<F>::DEFAULT_BOUNDS.0),
                F::cast(HyperTuning::<F>::DEFAULT_BOUNDS.1),
            )],
        }
    }
}

impl<F: Float> HyperTuning<F> {
    /// Default bounds for kernel parameters
    pub const DEFAULT_BOUNDS: (f64, f64) = (1e-3, 1e3);

    /// Bounds for each of `n_params` parameters, `None` when parameters are fixed
    pub fn bounds(&self, n_params: usize) -> Result<Option<Vec<(F, F)>>> {
        match self {
            HyperTuning::Fixed => Ok(None),
            HyperTuning::Full { bounds } if bounds.len() == 1 => Ok(Some(vec![bounds[0]; n_params])),
            HyperTuning::Full { bounds } if bounds.len() == n_params => Ok(Some(bounds.clone())),
            HyperTuning::Full { bounds } => Err(GpError::InvalidValueError(format!(
                "{} bounds given for {n_params} kernel parameters",
                bounds.len()
            ))),
        }
    }
}

/// A set of validated quasiseparable GP parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, K: Serialize",
        deserialize = "F: Deserialize<'de>, K: Deserialize<'de>"
    ))
)]
pub struct QsGpValidParams<F: Float, K: QuasisepKernel<F>> {
    /// Kernel, its parameters are the optimization starting point
    pub(crate) kernel: K,
    /// Observation noise
    pub(crate) noise: NoiseModel<F>,
    /// Jitter added to the diagonal to improve numerical stability
    pub(crate) nugget: F,
    /// Constant mean of the process
    pub(crate) mean: F,
    /// Kernel hyperparameters tuning
    pub(crate) tuning: HyperTuning<F>,
    /// Number of internal likelihood optimization restart
    pub(crate) n_start: usize,
    /// Max number of internal likelihood evaluation during optimization
    pub(crate) max_eval: usize,
}

impl<F: Float, K: QuasisepKernel<F>> QsGpValidParams<F, K> {
    /// Get the kernel
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Get the noise model
    pub fn noise(&self) -> &NoiseModel<F> {
        &self.noise
    }

    /// Get nugget
    pub fn nugget(&self) -> F {
        self.nugget
    }

    /// Get the constant mean
    pub fn mean(&self) -> F {
        self.mean
    }

    /// Get hyperparameters tuning
    pub fn tuning(&self) -> &HyperTuning<F> {
        &self.tuning
    }

    /// Get the number of internal optimization restart
    pub fn n_start(&self) -> usize {
        self.n_start
    }

    /// Get the max number of internal likelihood evaluations during one optimization
    pub fn max_eval(&self) -> usize {
        self.max_eval
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the fitting of
/// a [quasiseparable GP](crate::QsGaussianProcess).
pub struct QsGpParams<F: Float, K: QuasisepKernel<F>>(QsGpValidParams<F, K>);

impl<F: Float, K: QuasisepKernel<F>> QsGpParams<F, K> {
    /// A constructor for GP parameters given the initial kernel
    pub fn new(kernel: K) -> QsGpParams<F, K> {
        Self(QsGpValidParams {
            kernel,
            noise: NoiseModel::default(),
            nugget: F::cast(100.0) * F::epsilon(),
            mean: F::zero(),
            tuning: HyperTuning::default(),
            n_start: GP_OPTIM_N_START,
            max_eval: GP_COBYLA_MAX_EVAL,
        })
    }

    /// A constructor for GP parameters from validated parameters
    pub fn new_from_valid(params: &QsGpValidParams<F, K>) -> Self {
        Self(params.clone())
    }

    /// Set the kernel.
    ///
    /// When hyperparameters are optimized, the optimization starts from the kernel parameters.
    pub fn kernel(mut self, kernel: K) -> Self {
        self.0.kernel = kernel;
        self
    }

    /// Set the observation noise model
    pub fn noise(mut self, noise: NoiseModel<F>) -> Self {
        self.0.noise = noise;
        self
    }

    /// Set nugget.
    ///
    /// Nugget is added to the noise diagonal to improve numerical stability
    pub fn nugget(mut self, nugget: F) -> Self {
        self.0.nugget = nugget;
        self
    }

    /// Set the constant mean of the process
    pub fn mean(mut self, mean: F) -> Self {
        self.0.mean = mean;
        self
    }

    /// Set hyperparameters tuning
    pub fn tuning(mut self, tuning: HyperTuning<F>) -> Self {
        self.0.tuning = tuning;
        self
    }

    /// Set the number of internal hyperparameters optimization restarts
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.0.n_start = n_start;
        self
    }

    /// Set the max number of internal likelihood evaluations during one optimization.
    /// Given max_eval is raised to [crate::GP_COBYLA_MIN_EVAL] when lower.
    pub fn max_eval(mut self, max_eval: usize) -> Self {
        self.0.max_eval = GP_COBYLA_MIN_EVAL.max(max_eval);
        self
    }
}

impl<F: Float, K: QuasisepKernel<F>> From<QsGpValidParams<F, K>> for QsGpParams<F, K> {
    fn from(valid: QsGpValidParams<F, K>) -> Self {
        QsGpParams(valid)
    }
}

impl<F: Float, K: QuasisepKernel<F>> ParamGuard for QsGpParams<F, K> {
    type Checked = QsGpValidParams<F, K>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if !(self.0.nugget >= F::zero()) {
            return Err(GpError::InvalidValueError(format!(
                "nugget should be non negative, got {}",
                self.0.nugget
            )));
        }
        if !self.0.mean.is_finite() {
            return Err(GpError::InvalidValueError(
                "mean should be finite".to_string(),
            ));
        }
        self.0.noise.check()?;
        let params = self.0.kernel.parameters();
        if let Some(bounds) = self.0.tuning.bounds(params.len())? {
            if let Some((lo, up)) = bounds
                .iter()
                .find(|(lo, up)| !(*lo > F::zero() && lo <= up && up.is_finite()))
            {
                return Err(GpError::InvalidValueError(format!(
                    "bounds should verify 0 < lower <= upper < inf, got ({lo}, {up})"
                )));
            }
            if let Some(p) = params.iter().find(|p| !(**p > F::zero() && p.is_finite())) {
                return Err(GpError::InvalidValueError(format!(
                    "optimized kernel parameters should be strictly positive, got {p} in {}",
                    self.0.kernel
                )));
            }
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{Matern32, Sho};
    use ndarray::array;

    #[test]
    fn test_default_params() {
        let params = QsGpParams::new(Matern32::new(1.0, 1.0)).check().unwrap();
        assert_eq!(params.noise(), &NoiseModel::Uniform(0.0));
        assert_eq!(params.n_start(), GP_OPTIM_N_START);
        assert_eq!(params.max_eval(), GP_COBYLA_MAX_EVAL);
        assert_eq!(
            params.tuning().bounds(2).unwrap(),
            Some(vec![(1e-3, 1e3), (1e-3, 1e3)])
        );
    }

    #[test]
    fn test_max_eval_clamped() {
        let params = QsGpParams::new(Matern32::new(1.0, 1.0)).max_eval(1);
        assert_eq!(params.check().unwrap().max_eval(), GP_COBYLA_MIN_EVAL);
    }

    #[test]
    fn test_invalid_params() {
        let kernel = Sho::new(1.0, 1.0, 1.0);
        assert!(QsGpParams::new(kernel.clone()).nugget(-1.0).check().is_err());
        assert!(QsGpParams::new(kernel.clone())
            .noise(NoiseModel::Uniform(-0.1))
            .check()
            .is_err());
        assert!(QsGpParams::new(kernel.clone())
            .noise(NoiseModel::PerPoint(array![0.1, f64::NAN]))
            .check()
            .is_err());
        assert!(QsGpParams::new(kernel.clone())
            .tuning(HyperTuning::Full {
                bounds: vec![(1.0, 0.1)]
            })
            .check()
            .is_err());
        assert!(QsGpParams::new(kernel.clone())
            .tuning(HyperTuning::Full {
                bounds: vec![(0.1, 1.0), (0.1, 1.0)]
            })
            .check()
            .is_err());
        assert!(QsGpParams::new(Sho::new(-1.0, 1.0, 1.0)).check().is_err());
        assert!(QsGpParams::new(Sho::new(-1.0, 1.0, 1.0))
            .tuning(HyperTuning::Fixed)
            .check()
            .is_ok());
    }

    #[test]
    fn test_noise_diagonal() {
        assert_eq!(
            NoiseModel::Uniform(0.5).diagonal(3).unwrap(),
            array![0.5, 0.5, 0.5]
        );
        assert!(matches!(
            NoiseModel::PerPoint(array![0.5, 0.1]).diagonal(3),
            Err(GpError::ShapeError(_))
        ));
    }
}
