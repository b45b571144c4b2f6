use super::{lag, split_parameters, QuasisepKernel};
use crate::errors::Result;
use linfa::Float;
use ndarray::{array, Array1, Array2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Matern 3/2 kernel `sigma^2 (1 + f tau) exp(-f tau)` with `f = sqrt(3) / scale`
///
/// Hyperparameters order: `[sigma, scale]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct Matern32<F: Float> {
    sigma: F,
    scale: F,
}

impl<F: Float> Matern32<F> {
    /// Constructor
    pub fn new(sigma: F, scale: F) -> Self {
        Matern32 { sigma, scale }
    }

    /// Amplitude
    pub fn sigma(&self) -> F {
        self.sigma
    }

    /// Length scale
    pub fn scale(&self) -> F {
        self.scale
    }

    fn rate(&self) -> F {
        F::cast(3.).sqrt() / self.scale
    }
}

impl<F: Float> fmt::Display for Matern32<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Matern32(sigma={}, scale={})", self.sigma, self.scale)
    }
}

impl<F: Float> QuasisepKernel<F> for Matern32<F> {
    fn dimension(&self) -> usize {
        2
    }

    fn stationary_covariance(&self) -> Array2<F> {
        let f = self.rate();
        array![[F::one(), F::zero()], [F::zero(), f * f]]
    }

    fn observation_model(&self, _x: F) -> Array1<F> {
        array![self.sigma, F::zero()]
    }

    fn transition_matrix(&self, x1: F, x2: F) -> Array2<F> {
        let dt = x2 - x1;
        let f = self.rate();
        let decay = (-f * dt).exp();
        array![
            [decay * (F::one() + f * dt), -decay * f * f * dt],
            [decay * dt, decay * (F::one() - f * dt)]
        ]
    }

    fn value(&self, x1: F, x2: F) -> F {
        let r = self.rate() * lag(x1, x2);
        self.sigma * self.sigma * (F::one() + r) * (-r).exp()
    }

    fn parameters(&self) -> Vec<F> {
        vec![self.sigma, self.scale]
    }

    fn consume_parameters<'p>(&self, params: &'p [F]) -> Result<(Self, &'p [F])> {
        let (head, tail) = split_parameters(params, 2, "Matern32")?;
        Ok((Matern32::new(head[0], head[1]), tail))
    }
}

/// Matern 5/2 kernel `sigma^2 (1 + f tau + f^2 tau^2 / 3) exp(-f tau)` with `f = sqrt(5) / scale`
///
/// Hyperparameters order: `[sigma, scale]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct Matern52<F: Float> {
    sigma: F,
    scale: F,
}

impl<F: Float> Matern52<F> {
    /// Constructor
    pub fn new(sigma: F, scale: F) -> Self {
        Matern52 { sigma, scale }
    }

    /// Amplitude
    pub fn sigma(&self) -> F {
        self.sigma
    }

    /// Length scale
    pub fn scale(&self) -> F {
        self.scale
    }

    fn rate(&self) -> F {
        F::cast(5.).sqrt() / self.scale
    }
}

impl<F: Float> fmt::Display for Matern52<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Matern52(sigma={}, scale={})", self.sigma, self.scale)
    }
}

impl<F: Float> QuasisepKernel<F> for Matern52<F> {
    fn dimension(&self) -> usize {
        3
    }

    fn stationary_covariance(&self) -> Array2<F> {
        let f = self.rate();
        let f2 = f * f;
        let third = f2 / F::cast(3.);
        array![
            [F::one(), F::zero(), -third],
            [F::zero(), third, F::zero()],
            [-third, F::zero(), f2 * f2]
        ]
    }

    fn observation_model(&self, _x: F) -> Array1<F> {
        array![self.sigma, F::zero(), F::zero()]
    }

    fn transition_matrix(&self, x1: F, x2: F) -> Array2<F> {
        let d = x2 - x1;
        let f = self.rate();
        let (one, two, half) = (F::one(), F::cast(2.), F::cast(0.5));
        let (fd, f2) = (f * d, f * f);
        let d2 = d * d;
        let decay = (-fd).exp();
        let a = array![
            [
                half * f2 * d2 + fd + one,
                -half * f2 * f * d2,
                half * f2 * f * d * (fd - two)
            ],
            [d * (fd + one), -f2 * d2 + fd + one, f2 * d * (fd - F::cast(3.))],
            [half * d2, half * d * (two - fd), half * f2 * d2 - two * fd + one]
        ];
        a.mapv(|v| v * decay)
    }

    fn value(&self, x1: F, x2: F) -> F {
        let r = self.rate() * lag(x1, x2);
        self.sigma * self.sigma * (F::one() + r + r * r / F::cast(3.)) * (-r).exp()
    }

    fn parameters(&self) -> Vec<F> {
        vec![self.sigma, self.scale]
    }

    fn consume_parameters<'p>(&self, params: &'p [F]) -> Result<(Self, &'p [F])> {
        let (head, tail) = split_parameters(params, 2, "Matern52")?;
        Ok((Matern52::new(head[0], head[1]), tail))
    }
}
