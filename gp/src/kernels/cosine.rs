use super::{lag, split_parameters, QuasisepKernel};
use crate::errors::Result;
use linfa::Float;
use ndarray::{array, Array1, Array2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cosine kernel `sigma^2 cos(2 pi tau / scale)`, a pure periodic signal of period `scale`.
///
/// The covariance matrix is only positive semi-definite: use it with a noise
/// diagonal or as a factor of a product.
///
/// Hyperparameters order: `[sigma, scale]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct Cosine<F: Float> {
    sigma: F,
    scale: F,
}

impl<F: Float> Cosine<F> {
    /// Constructor
    pub fn new(sigma: F, scale: F) -> Self {
        Cosine { sigma, scale }
    }

    /// Amplitude
    pub fn sigma(&self) -> F {
        self.sigma
    }

    /// Period
    pub fn scale(&self) -> F {
        self.scale
    }

    fn frequency(&self) -> F {
        F::cast(2. * std::f64::consts::PI) / self.scale
    }
}

impl<F: Float> fmt::Display for Cosine<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Cosine(sigma={}, scale={})", self.sigma, self.scale)
    }
}

impl<F: Float> QuasisepKernel<F> for Cosine<F> {
    fn dimension(&self) -> usize {
        2
    }

    fn stationary_covariance(&self) -> Array2<F> {
        Array2::eye(2)
    }

    fn observation_model(&self, _x: F) -> Array1<F> {
        array![self.sigma, F::zero()]
    }

    fn transition_matrix(&self, x1: F, x2: F) -> Array2<F> {
        let arg = self.frequency() * (x2 - x1);
        let (s, c) = (arg.sin(), arg.cos());
        array![[c, -s], [s, c]]
    }

    fn value(&self, x1: F, x2: F) -> F {
        self.sigma * self.sigma * (self.frequency() * lag(x1, x2)).cos()
    }

    fn parameters(&self) -> Vec<F> {
        vec![self.sigma, self.scale]
    }

    fn consume_parameters<'p>(&self, params: &'p [F]) -> Result<(Self, &'p [F])> {
        let (head, tail) = split_parameters(params, 2, "Cosine")?;
        Ok((Cosine::new(head[0], head[1]), tail))
    }
}
