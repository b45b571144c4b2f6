//! A module for quasiseparable kernels used to model one-dimensional gaussian processes.
//!
//! Each kernel is described by a linear stochastic differential equation of small state
//! dimension J (the rank of the resulting quasiseparable covariance matrix):
//! * an observation model `h(x)` (J),
//! * a stationary state covariance `Pinf` (J x J),
//! * a transition matrix `A(x1, x2)` (J x J) propagating the state from `x1` to `x2 >= x1`.
//!
//! For `x_i >= x_j` the covariance is then `k(x_i, x_j) = h(x_i)^T Pinf A(x_j, x_i) h(x_j)`.
//!
//! The following kernels are implemented:
//! * stochastically driven damped harmonic oscillator ([Sho]),
//! * exponential ([Exp]),
//! * matern 3/2 ([Matern32]) and matern 5/2 ([Matern52]),
//! * cosine ([Cosine]).
//!
//! Kernels are combined with `+` ([Sum], state dimensions add), `*` ([Product], state
//! dimensions multiply) and scaled with [Scale].
//!
//! **Warning**: the state dimension of a product is the product of the state dimensions
//! of its factors, and the cost of every O(N) operation grows with the cube of the state
//! dimension. Repeated products get expensive quickly.

use crate::errors::{GpError, Result};
use crate::qsm::SymmQsm;
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1};
use std::fmt;

mod cosine;
mod exp;
mod matern;
mod ops;
mod sho;

pub use cosine::*;
pub use exp::*;
pub use matern::*;
pub use ops::*;
pub use sho::*;

/// State dimension above which building a representation logs a warning
pub const PRODUCT_RANK_WARNING: usize = 16;

/// A trait for kernels admitting a quasiseparable (state space) representation
pub trait QuasisepKernel<F: Float>: Clone + fmt::Debug + fmt::Display + Send + Sync {
    /// Dimension J of the state, i.e. the rank of the quasiseparable representation
    fn dimension(&self) -> usize;

    /// Stationary covariance `Pinf` of the state (J x J)
    fn stationary_covariance(&self) -> Array2<F>;

    /// Observation model `h(x)` projecting the state onto the process value (J)
    fn observation_model(&self, x: F) -> Array1<F>;

    /// Transition matrix `A(x1, x2)` propagating the state from `x1` to `x2 >= x1` (J x J).
    /// `A(x, x)` is the identity.
    fn transition_matrix(&self, x1: F, x2: F) -> Array2<F>;

    /// Closed form covariance value `k(x1, x2)`
    fn value(&self, x1: F, x2: F) -> F;

    /// Prior variance `k(x, x)`
    fn diag(&self, x: F) -> F {
        self.value(x, x)
    }

    /// Kernel hyperparameters in natural units.
    /// Conventionally positive, but positivity is not enforced.
    fn parameters(&self) -> Vec<F>;

    /// Build a kernel of the same structure from the leading values of `params`
    /// and return the values left over.
    fn consume_parameters<'p>(&self, params: &'p [F]) -> Result<(Self, &'p [F])>;

    /// Build a kernel of the same structure from exactly `params`
    fn reparameterize(&self, params: &[F]) -> Result<Self> {
        let (kernel, left) = self.consume_parameters(params)?;
        if !left.is_empty() {
            return Err(GpError::InvalidValueError(format!(
                "{} extra parameters given to kernel {}",
                left.len(),
                self
            )));
        }
        Ok(kernel)
    }

    /// Number of hyperparameters
    fn n_parameters(&self) -> usize {
        self.parameters().len()
    }

    /// Build the quasiseparable representation of the covariance matrix at `x`
    /// given in ascending order.
    fn to_symm_qsm(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<SymmQsm<F>> {
        SymmQsm::from_kernel(self, x)
    }

    /// Dense cross covariance matrix `k(x1_i, x2_j)` computed from the closed form
    fn covariance(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix1>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array2<F> {
        Array2::from_shape_fn((x1.len(), x2.len()), |(i, j)| self.value(x1[i], x2[j]))
    }
}

/// Absolute distance `|x1 - x2|`
pub(crate) fn lag<F: Float>(x1: F, x2: F) -> F {
    num_traits::float::Float::abs(x1 - x2)
}

/// Split `n` parameters for kernel `name` off the front of `params`
pub(crate) fn split_parameters<'p, F: Float>(
    params: &'p [F],
    n: usize,
    name: &str,
) -> Result<(&'p [F], &'p [F])> {
    if params.len() < n {
        return Err(GpError::InvalidValueError(format!(
            "{name} kernel expects {n} parameters, only {} left",
            params.len()
        )));
    }
    Ok(params.split_at(n))
}

/// Implement `+` and `*` for a kernel generic over the float type
macro_rules! impl_kernel_ops {
    ($($kernel:ident),*) => {
        $(
            impl<F: Float, B> std::ops::Add<B> for $kernel<F> {
                type Output = Sum<$kernel<F>, B>;

                fn add(self, rhs: B) -> Self::Output {
                    Sum::new(self, rhs)
                }
            }

            impl<F: Float, B> std::ops::Mul<B> for $kernel<F> {
                type Output = Product<$kernel<F>, B>;

                fn mul(self, rhs: B) -> Self::Output {
                    Product::new(self, rhs)
                }
            }
        )*
    };
}

impl_kernel_ops!(Sho, Exp, Matern32, Matern52, Cosine);

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use paste::paste;

    fn xs() -> Array1<f64> {
        array![-1.3, -0.2, 0.0, 0.0, 0.35, 1.1, 1.7, 2.9, 3.05, 5.2]
    }

    fn wide_xs() -> Array1<f64> {
        array![0.0, 0.002, 0.5, 3.0, 20.0, 20.0, 45.0, 120.0, 300.0]
    }

    macro_rules! test_kernel {
        ($name:ident, $kernel:expr) => {
            test_kernel!($name, $kernel, xs());
        };
        ($name:ident, $kernel:expr, $x:expr) => {
            paste! {
                #[test]
                fn [<test_ $name _structured_entries>]() {
                    let kernel = $kernel;
                    let x = $x;
                    let qsm = kernel.to_symm_qsm(&x).unwrap();
                    assert_eq!(qsm.rank(), kernel.dimension());
                    let dense = qsm.to_dense();
                    let expected = kernel.covariance(&x, &x);
                    assert_abs_diff_eq!(dense, expected, epsilon = 1e-10);
                }

                #[test]
                fn [<test_ $name _identity_transition>]() {
                    let kernel = $kernel;
                    let a = kernel.transition_matrix(0.7, 0.7);
                    assert_abs_diff_eq!(a, Array2::eye(kernel.dimension()), epsilon = 1e-12);
                }

                #[test]
                fn [<test_ $name _transition_semigroup>]() {
                    let kernel = $kernel;
                    let a = kernel.transition_matrix(0.1, 0.6);
                    let b = kernel.transition_matrix(0.6, 1.45);
                    let ab = kernel.transition_matrix(0.1, 1.45);
                    assert_abs_diff_eq!(b.dot(&a), ab, epsilon = 1e-10);
                }

                #[test]
                fn [<test_ $name _reparameterize>]() {
                    let kernel = $kernel;
                    let params = kernel.parameters();
                    assert_eq!(params.len(), kernel.n_parameters());
                    let same = kernel.reparameterize(&params).unwrap();
                    assert_abs_diff_eq!(same.value(0.3, 1.2), kernel.value(0.3, 1.2), epsilon = 1e-14);
                    let mut more = params.clone();
                    more.push(1.0);
                    assert!(kernel.reparameterize(&more).is_err());
                    assert!(kernel.reparameterize(&params[1..]).is_err());
                }
            }
        };
    }

    test_kernel!(sho_underdamped, Sho::new(1.3, 2.1, 3.5));
    test_kernel!(sho_critical, Sho::new(0.8, 1.5, 0.5));
    test_kernel!(sho_overdamped, Sho::new(1.1, 0.9, 0.2));
    test_kernel!(sho_underdamped_fast, Sho::new(1.0, 20.0, 50.0), wide_xs());
    test_kernel!(sho_critical_fast, Sho::new(1.0, 30.0, 0.5), wide_xs());
    test_kernel!(sho_overdamped_low_quality, Sho::new(1.0, 5.0, 1e-3), wide_xs());
    test_kernel!(sho_overdamped_slow, Sho::new(2.0, 1e-2, 0.1), wide_xs());
    test_kernel!(exp, Exp::new(1.5, 0.7));
    test_kernel!(matern32, Matern32::new(1.2, 0.8));
    test_kernel!(matern52, Matern52::new(0.9, 1.3));
    test_kernel!(cosine, Cosine::new(1.0, 2.5));
    test_kernel!(sum, Sho::new(1.0, 2.0, 1.5) + Matern32::new(0.5, 1.7));
    test_kernel!(product, Matern32::new(1.0, 1.2) * Cosine::new(0.7, 3.0));
    test_kernel!(scale, Scale::new(Matern52::new(1.0, 0.6), 2.5));
    test_kernel!(
        nested,
        Scale::new(Exp::new(1.0, 2.0) * Sho::new(1.0, 3.0, 2.0), 0.5) + Matern32::new(0.3, 0.2)
    );

    #[test]
    fn test_sum_and_product_values() {
        let a = Sho::new(1.0, 2.0, 1.5);
        let b = Matern32::new(0.5, 1.7);
        let (x1, x2) = (0.4, 2.1);
        let sum = a.clone() + b.clone();
        let prod = a.clone() * b.clone();
        assert_abs_diff_eq!(sum.value(x1, x2), a.value(x1, x2) + b.value(x1, x2));
        assert_abs_diff_eq!(prod.value(x1, x2), a.value(x1, x2) * b.value(x1, x2));
        assert_eq!(sum.dimension(), 4);
        assert_eq!(prod.dimension(), 4);
        assert_eq!((prod * Matern52::new(1.0, 1.0)).dimension(), 12);
    }

    #[test]
    fn test_parameters_order() {
        let kernel = Sho::new(1.0, 2.0, 3.0) + Scale::new(Matern32::new(4.0, 5.0), 6.0);
        assert_eq!(kernel.parameters(), vec![1.0, 2.0, 3.0, 6.0, 4.0, 5.0]);
        let other = kernel
            .reparameterize(&[0.1, 0.2, 0.3, 0.6, 0.4, 0.5])
            .unwrap();
        assert_eq!(other.parameters(), vec![0.1, 0.2, 0.3, 0.6, 0.4, 0.5]);
    }
}
