use super::{lag, split_parameters, QuasisepKernel};
use crate::errors::Result;
use linfa::Float;
use ndarray::{array, Array1, Array2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stochastically driven damped harmonic oscillator kernel.
///
/// The process solves `y'' + (omega / quality) y' + omega^2 y = noise`, its covariance
/// depends on the damping regime:
/// * underdamped (`quality > 1/2`): oscillating with an exponentially decaying envelope,
/// * critically damped (`quality == 1/2`): `sigma^2 (1 + omega tau) exp(-omega tau)`,
/// * overdamped (`quality < 1/2`): sum of two decaying exponentials.
///
/// Hyperparameters order: `[sigma, omega, quality]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct Sho<F: Float> {
    /// Amplitude
    sigma: F,
    /// Undamped angular frequency
    omega: F,
    /// Quality factor
    quality: F,
}

impl<F: Float> Sho<F> {
    /// Constructor
    pub fn new(sigma: F, omega: F, quality: F) -> Self {
        Sho {
            sigma,
            omega,
            quality,
        }
    }

    /// Amplitude
    pub fn sigma(&self) -> F {
        self.sigma
    }

    /// Undamped angular frequency
    pub fn omega(&self) -> F {
        self.omega
    }

    /// Quality factor
    pub fn quality(&self) -> F {
        self.quality
    }

    /// Overdamped regime `f = sqrt(1 - 4 Q^2)` with the slow and fast decay rates
    /// `omega (1 -+ f) / 2Q` of the two exponentials making up the covariance.
    fn overdamped_rates(&self) -> (F, F, F) {
        let (w, q) = (self.omega, self.quality);
        let four_q2 = F::cast(4.) * q * q;
        let f = (F::one() - four_q2).sqrt();
        // 1 - f = 4 Q^2 / (1 + f), without cancellation for small Q
        let slow = w * F::cast(2.) * q / (F::one() + f);
        let fast = w * (F::one() + f) / (F::cast(2.) * q);
        (f, slow, fast)
    }

    fn is_critical(&self) -> bool {
        let gap = self.quality - F::cast(0.5);
        gap < F::cast(1e-8) && gap > F::cast(-1e-8)
    }
}

impl<F: Float> fmt::Display for Sho<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Sho(sigma={}, omega={}, quality={})",
            self.sigma, self.omega, self.quality
        )
    }
}

impl<F: Float> QuasisepKernel<F> for Sho<F> {
    fn dimension(&self) -> usize {
        2
    }

    fn stationary_covariance(&self) -> Array2<F> {
        array![[F::one(), F::zero()], [F::zero(), self.omega * self.omega]]
    }

    fn observation_model(&self, _x: F) -> Array1<F> {
        array![self.sigma, F::zero()]
    }

    fn transition_matrix(&self, x1: F, x2: F) -> Array2<F> {
        let dt = x2 - x1;
        let (w, q) = (self.omega, self.quality);
        let two = F::cast(2.);
        if self.is_critical() {
            let decay = (-w * dt).exp();
            return array![
                [decay * (F::one() + w * dt), -decay * w * w * dt],
                [decay * dt, decay * (F::one() - w * dt)]
            ];
        }
        let half = F::cast(0.5);
        let four_q2 = F::cast(4.) * q * q;
        let (f, c, s) = if q > half {
            let f = (four_q2 - F::one()).sqrt();
            let decay = (-half * w * dt / q).exp();
            let arg = half * f * w * dt / q;
            (f, decay * arg.cos(), decay * arg.sin())
        } else {
            let (f, slow, fast) = self.overdamped_rates();
            let (e_slow, e_fast) = ((-slow * dt).exp(), (-fast * dt).exp());
            (f, half * (e_slow + e_fast), half * (e_slow - e_fast))
        };
        array![
            [c + s / f, -two * q * w * s / f],
            [two * q * s / (w * f), c - s / f]
        ]
    }

    fn value(&self, x1: F, x2: F) -> F {
        let tau = lag(x1, x2);
        let (w, q) = (self.omega, self.quality);
        let s2 = self.sigma * self.sigma;
        if self.is_critical() {
            return s2 * (F::one() + w * tau) * (-w * tau).exp();
        }
        if q > F::cast(0.5) {
            let two_q = F::cast(2.) * q;
            let decay = (-w * tau / two_q).exp();
            let eta = w * (F::one() - F::one() / (two_q * two_q)).sqrt();
            s2 * decay * ((eta * tau).cos() + w / (two_q * eta) * (eta * tau).sin())
        } else {
            let (f, slow, fast) = self.overdamped_rates();
            let (e_slow, e_fast) = ((-slow * tau).exp(), (-fast * tau).exp());
            let half = F::cast(0.5);
            s2 * half * ((F::one() + F::one() / f) * e_slow + (F::one() - F::one() / f) * e_fast)
        }
    }

    fn parameters(&self) -> Vec<F> {
        vec![self.sigma, self.omega, self.quality]
    }

    fn consume_parameters<'p>(&self, params: &'p [F]) -> Result<(Self, &'p [F])> {
        let (head, tail) = split_parameters(params, 3, "Sho")?;
        Ok((Sho::new(head[0], head[1], head[2]), tail))
    }
}
