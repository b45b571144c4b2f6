use super::{lag, split_parameters, QuasisepKernel};
use crate::errors::Result;
use linfa::Float;
use ndarray::{array, Array1, Array2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exponential kernel `sigma^2 exp(-tau / scale)` (Ornstein-Uhlenbeck process), rank 1
///
/// Hyperparameters order: `[sigma, scale]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct Exp<F: Float> {
    sigma: F,
    scale: F,
}

impl<F: Float> Exp<F> {
    /// Constructor
    pub fn new(sigma: F, scale: F) -> Self {
        Exp { sigma, scale }
    }

    /// Amplitude
    pub fn sigma(&self) -> F {
        self.sigma
    }

    /// Length scale
    pub fn scale(&self) -> F {
        self.scale
    }
}

impl<F: Float> fmt::Display for Exp<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Exp(sigma={}, scale={})", self.sigma, self.scale)
    }
}

impl<F: Float> QuasisepKernel<F> for Exp<F> {
    fn dimension(&self) -> usize {
        1
    }

    fn stationary_covariance(&self) -> Array2<F> {
        array![[F::one()]]
    }

    fn observation_model(&self, _x: F) -> Array1<F> {
        array![self.sigma]
    }

    fn transition_matrix(&self, x1: F, x2: F) -> Array2<F> {
        array![[(-(x2 - x1) / self.scale).exp()]]
    }

    fn value(&self, x1: F, x2: F) -> F {
        self.sigma * self.sigma * (-lag(x1, x2) / self.scale).exp()
    }

    fn parameters(&self) -> Vec<F> {
        vec![self.sigma, self.scale]
    }

    fn consume_parameters<'p>(&self, params: &'p [F]) -> Result<(Self, &'p [F])> {
        let (head, tail) = split_parameters(params, 2, "Exp")?;
        Ok((Exp::new(head[0], head[1]), tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_exp_value() {
        let kernel = Exp::new(3.0, 0.5);
        assert_abs_diff_eq!(kernel.value(2.0, 1.0), 9. * (-2f64).exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(kernel.transition_matrix(1.0, 2.0)[[0, 0]], (-2f64).exp());
    }
}
