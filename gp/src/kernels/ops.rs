use super::QuasisepKernel;
use crate::errors::Result;
use crate::utils::{block_diag, kron_vec};
use linfa::Float;
use ndarray::linalg::kron;
use ndarray::{Array1, Array2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kernel representing the sum of two other kernels.
///
/// States are stacked: the rank of the sum is the sum of the ranks.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Sum<A, B> {
    a: A,
    b: B,
}

impl<A, B> Sum<A, B> {
    /// Construct a new kernel from two other kernels
    pub fn new(a: A, b: B) -> Self {
        Sum { a, b }
    }
}

impl<A: fmt::Display, B: fmt::Display> fmt::Display for Sum<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({} + {})", self.a, self.b)
    }
}

impl<F, A, B> QuasisepKernel<F> for Sum<A, B>
where
    F: Float,
    A: QuasisepKernel<F>,
    B: QuasisepKernel<F>,
{
    fn dimension(&self) -> usize {
        self.a.dimension() + self.b.dimension()
    }

    fn stationary_covariance(&self) -> Array2<F> {
        block_diag(
            &self.a.stationary_covariance(),
            &self.b.stationary_covariance(),
        )
    }

    fn observation_model(&self, x: F) -> Array1<F> {
        let (ha, hb) = (self.a.observation_model(x), self.b.observation_model(x));
        ha.iter().chain(hb.iter()).cloned().collect()
    }

    fn transition_matrix(&self, x1: F, x2: F) -> Array2<F> {
        block_diag(
            &self.a.transition_matrix(x1, x2),
            &self.b.transition_matrix(x1, x2),
        )
    }

    fn value(&self, x1: F, x2: F) -> F {
        self.a.value(x1, x2) + self.b.value(x1, x2)
    }

    fn parameters(&self) -> Vec<F> {
        let a = self.a.parameters();
        let b = self.b.parameters();
        a.into_iter().chain(b).collect()
    }

    fn consume_parameters<'p>(&self, params: &'p [F]) -> Result<(Self, &'p [F])> {
        let (a, b_params) = self.a.consume_parameters(params)?;
        let (b, left) = self.b.consume_parameters(b_params)?;
        Ok((Sum::new(a, b), left))
    }
}

/// Kernel representing the product of two other kernels.
///
/// States are combined with a Kronecker product: the rank of the product is the
/// product of the ranks and the cost of O(N) algorithms grows with its cube.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Product<A, B> {
    a: A,
    b: B,
}

impl<A, B> Product<A, B> {
    /// Construct a new kernel from two other kernels
    pub fn new(a: A, b: B) -> Self {
        Product { a, b }
    }
}

impl<A: fmt::Display, B: fmt::Display> fmt::Display for Product<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({} * {})", self.a, self.b)
    }
}

impl<F, A, B> QuasisepKernel<F> for Product<A, B>
where
    F: Float,
    A: QuasisepKernel<F>,
    B: QuasisepKernel<F>,
{
    fn dimension(&self) -> usize {
        self.a.dimension() * self.b.dimension()
    }

    fn stationary_covariance(&self) -> Array2<F> {
        kron(
            &self.a.stationary_covariance(),
            &self.b.stationary_covariance(),
        )
    }

    fn observation_model(&self, x: F) -> Array1<F> {
        kron_vec(&self.a.observation_model(x), &self.b.observation_model(x))
    }

    fn transition_matrix(&self, x1: F, x2: F) -> Array2<F> {
        kron(
            &self.a.transition_matrix(x1, x2),
            &self.b.transition_matrix(x1, x2),
        )
    }

    fn value(&self, x1: F, x2: F) -> F {
        self.a.value(x1, x2) * self.b.value(x1, x2)
    }

    fn parameters(&self) -> Vec<F> {
        let a = self.a.parameters();
        let b = self.b.parameters();
        a.into_iter().chain(b).collect()
    }

    fn consume_parameters<'p>(&self, params: &'p [F]) -> Result<(Self, &'p [F])> {
        let (a, b_params) = self.a.consume_parameters(params)?;
        let (b, left) = self.b.consume_parameters(b_params)?;
        Ok((Product::new(a, b), left))
    }
}

/// Kernel multiplied by a constant factor.
///
/// Hyperparameters order: `[factor, kernel parameters...]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Scale<F, K> {
    kernel: K,
    factor: F,
}

impl<F, K> Scale<F, K> {
    /// Scale `kernel` covariance values by `factor`
    pub fn new(kernel: K, factor: F) -> Self {
        Scale { kernel, factor }
    }
}

impl<F: fmt::Display, K: fmt::Display> fmt::Display for Scale<F, K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} * {}", self.factor, self.kernel)
    }
}

impl<F, K> QuasisepKernel<F> for Scale<F, K>
where
    F: Float,
    K: QuasisepKernel<F>,
{
    fn dimension(&self) -> usize {
        self.kernel.dimension()
    }

    fn stationary_covariance(&self) -> Array2<F> {
        self.kernel.stationary_covariance().mapv(|v| v * self.factor)
    }

    fn observation_model(&self, x: F) -> Array1<F> {
        self.kernel.observation_model(x)
    }

    fn transition_matrix(&self, x1: F, x2: F) -> Array2<F> {
        self.kernel.transition_matrix(x1, x2)
    }

    fn value(&self, x1: F, x2: F) -> F {
        self.factor * self.kernel.value(x1, x2)
    }

    fn parameters(&self) -> Vec<F> {
        let mut params = vec![self.factor];
        params.extend(self.kernel.parameters());
        params
    }

    fn consume_parameters<'p>(&self, params: &'p [F]) -> Result<(Self, &'p [F])> {
        let (head, rest) = super::split_parameters(params, 1, "Scale")?;
        let (kernel, left) = self.kernel.consume_parameters(rest)?;
        Ok((Scale::new(kernel, head[0]), left))
    }
}

macro_rules! impl_composite_ops {
    ($($composite:ident<$p:ident, $q:ident>),*) => {
        $(
            impl<$p, $q, C> std::ops::Add<C> for $composite<$p, $q> {
                type Output = Sum<Self, C>;

                fn add(self, rhs: C) -> Self::Output {
                    Sum::new(self, rhs)
                }
            }

            impl<$p, $q, C> std::ops::Mul<C> for $composite<$p, $q> {
                type Output = Product<Self, C>;

                fn mul(self, rhs: C) -> Self::Output {
                    Product::new(self, rhs)
                }
            }
        )*
    };
}

impl_composite_ops!(Sum<A, B>, Product<A, B>, Scale<F, K>);
