//! Symmetric quasiseparable matrices.
//!
//! A symmetric N x N matrix `K` is represented by, for each position `i`:
//! * a diagonal value `d_i`,
//! * left and right factors `p_i` and `q_i` of size J,
//! * a J x J propagation matrix `a_i` (`a_0` is the identity),
//!
//! such that for `i > j`: `K_ij = p_i^T a_i a_{i-1} ... a_{j+1} q_j`.
//! The matrix is never materialized: storage is O(N J^2) and a matrix vector
//! product costs O(N J^2).

use crate::errors::{GpError, Result};
use crate::factorization::QsmFactor;
use crate::kernels::{QuasisepKernel, PRODUCT_RANK_WARNING};
use crate::utils::{block_diag, check_sorted, kron_vec, outer};
use linfa::Float;
use log::{debug, warn};
use ndarray::linalg::kron;
use ndarray::{Array1, Array2, Array3, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix1, Ix2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Symmetric quasiseparable matrix
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct SymmQsm<F: Float> {
    /// Diagonal (N)
    pub(crate) diag: Array1<F>,
    /// Left factors (N, J)
    pub(crate) p: Array2<F>,
    /// Right factors (N, J)
    pub(crate) q: Array2<F>,
    /// Propagation matrices (N, J, J)
    pub(crate) a: Array3<F>,
}

impl<F: Float> SymmQsm<F> {
    /// Build the representation of the covariance matrix of `kernel` at inputs `x`.
    ///
    /// Returns a [GpError::DomainError] when `x` is not sorted in ascending order
    /// or holds non finite values.
    pub fn from_kernel<K: QuasisepKernel<F>>(
        kernel: &K,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<SymmQsm<F>> {
        check_sorted(x)?;
        let rank = kernel.dimension();
        if rank > PRODUCT_RANK_WARNING {
            warn!(
                "Kernel {kernel} has a state of dimension {rank}, quasiseparable algorithms cost grows as its cube"
            );
        }
        let n = x.len();
        let pinf = kernel.stationary_covariance();
        let mut diag = Array1::zeros(n);
        let mut p = Array2::zeros((n, rank));
        let mut q = Array2::zeros((n, rank));
        let mut a = Array3::zeros((n, rank, rank));
        for i in 0..n {
            let h = kernel.observation_model(x[i]);
            let ph = pinf.t().dot(&h);
            diag[i] = h.dot(&ph);
            p.row_mut(i).assign(&ph);
            q.row_mut(i).assign(&h);
            let prev = if i == 0 { x[0] } else { x[i - 1] };
            a.index_axis_mut(Axis(0), i)
                .assign(&kernel.transition_matrix(prev, x[i]));
        }
        Ok(SymmQsm { diag, p, q, a })
    }

    /// Build a quasiseparable matrix from its raw components
    pub fn from_parts(
        diag: Array1<F>,
        p: Array2<F>,
        q: Array2<F>,
        a: Array3<F>,
    ) -> Result<SymmQsm<F>> {
        let n = diag.len();
        let rank = p.ncols();
        if p.nrows() != n || q.dim() != (n, rank) || a.dim() != (n, rank, rank) {
            return Err(GpError::ShapeError(format!(
                "inconsistent quasiseparable components: diag {n}, p {:?}, q {:?}, a {:?}",
                p.dim(),
                q.dim(),
                a.dim()
            )));
        }
        Ok(SymmQsm { diag, p, q, a })
    }

    /// Size N of the (square) matrix
    pub fn len(&self) -> usize {
        self.diag.len()
    }

    /// Whether the matrix is empty
    pub fn is_empty(&self) -> bool {
        self.diag.is_empty()
    }

    /// Rank J of the off diagonal blocks
    pub fn rank(&self) -> usize {
        self.p.ncols()
    }

    /// Diagonal values
    pub fn diag(&self) -> ArrayView1<F> {
        self.diag.view()
    }

    /// Left factors `p` (N, J)
    pub fn p(&self) -> ArrayView2<F> {
        self.p.view()
    }

    /// Right factors `q` (N, J)
    pub fn q(&self) -> ArrayView2<F> {
        self.q.view()
    }

    /// Propagation matrix at position `i`
    pub fn a(&self, i: usize) -> ArrayView2<F> {
        self.a.index_axis(Axis(0), i)
    }

    /// Entry `(i, j)` of the matrix, computed in O(|i - j| J^2)
    pub fn get(&self, i: usize, j: usize) -> F {
        let (i, j) = if i >= j { (i, j) } else { (j, i) };
        if i == j {
            return self.diag[i];
        }
        let mut v = self.q.row(j).to_owned();
        for k in j + 1..=i {
            v = self.a(k).dot(&v);
        }
        self.p.row(i).dot(&v)
    }

    /// Dense N x N matrix. Only meant for small sizes (tests, debugging).
    pub fn to_dense(&self) -> Array2<F> {
        let n = self.len();
        let mut dense = Array2::zeros((n, n));
        for j in 0..n {
            dense[[j, j]] = self.diag[j];
            let mut v = self.q.row(j).to_owned();
            for i in j + 1..n {
                v = self.a(i).dot(&v);
                let kij = self.p.row(i).dot(&v);
                dense[[i, j]] = kij;
                dense[[j, i]] = kij;
            }
        }
        dense
    }

    /// Add the non negative `noise` vector to the diagonal
    pub fn with_diagonal(&self, noise: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<SymmQsm<F>> {
        if noise.len() != self.len() {
            return Err(GpError::ShapeError(format!(
                "diagonal of length {} expected, got {}",
                self.len(),
                noise.len()
            )));
        }
        if let Some(i) = noise.iter().position(|v| !(*v >= F::zero() && v.is_finite())) {
            return Err(GpError::InvalidValueError(format!(
                "diagonal noise should be finite and non negative, got {} at position {i}",
                noise[i]
            )));
        }
        let mut res = self.clone();
        res.diag += noise;
        Ok(res)
    }

    fn check_same_len(&self, other: &SymmQsm<F>) -> Result<()> {
        if self.len() != other.len() {
            return Err(GpError::ShapeError(format!(
                "quasiseparable matrices of different sizes {} and {}",
                self.len(),
                other.len()
            )));
        }
        Ok(())
    }

    /// Sum of two quasiseparable matrices defined on the same inputs, rank is `J1 + J2`
    pub fn sum(&self, other: &SymmQsm<F>) -> Result<SymmQsm<F>> {
        self.check_same_len(other)?;
        let (n, r1, r2) = (self.len(), self.rank(), other.rank());
        let mut p = Array2::zeros((n, r1 + r2));
        let mut q = Array2::zeros((n, r1 + r2));
        let mut a = Array3::zeros((n, r1 + r2, r1 + r2));
        for i in 0..n {
            p.row_mut(i)
                .assign(&self.p.row(i).iter().chain(other.p.row(i)).cloned().collect::<Array1<F>>());
            q.row_mut(i)
                .assign(&self.q.row(i).iter().chain(other.q.row(i)).cloned().collect::<Array1<F>>());
            a.index_axis_mut(Axis(0), i)
                .assign(&block_diag(&self.a(i), &other.a(i)));
        }
        Ok(SymmQsm {
            diag: &self.diag + &other.diag,
            p,
            q,
            a,
        })
    }

    /// Elementwise (Hadamard) product of two quasiseparable matrices defined on
    /// the same inputs, rank is `J1 * J2`.
    ///
    /// The diagonal of the result is the product of the diagonals: compose
    /// covariance matrices before adding observation noise.
    pub fn product(&self, other: &SymmQsm<F>) -> Result<SymmQsm<F>> {
        self.check_same_len(other)?;
        let (n, rank) = (self.len(), self.rank() * other.rank());
        if rank > PRODUCT_RANK_WARNING {
            warn!(
                "Product of quasiseparable matrices of ranks {} and {} has rank {rank}",
                self.rank(),
                other.rank()
            );
        }
        let mut p = Array2::zeros((n, rank));
        let mut q = Array2::zeros((n, rank));
        let mut a = Array3::zeros((n, rank, rank));
        for i in 0..n {
            p.row_mut(i).assign(&kron_vec(&self.p.row(i), &other.p.row(i)));
            q.row_mut(i).assign(&kron_vec(&self.q.row(i), &other.q.row(i)));
            a.index_axis_mut(Axis(0), i)
                .assign(&kron(&self.a(i), &other.a(i)));
        }
        Ok(SymmQsm {
            diag: &self.diag * &other.diag,
            p,
            q,
            a,
        })
    }

    /// Matrix multiplied by `factor`
    pub fn scale(&self, factor: F) -> SymmQsm<F> {
        SymmQsm {
            diag: self.diag.mapv(|v| v * factor),
            p: self.p.mapv(|v| v * factor),
            q: self.q.clone(),
            a: self.a.clone(),
        }
    }

    /// Matrix product `K x` where `x` is (N, K), in O(N J (J + K))
    pub fn apply(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        let n = self.len();
        if x.nrows() != n {
            return Err(GpError::ShapeError(format!(
                "right hand side with {} rows expected, got {}",
                n,
                x.nrows()
            )));
        }
        let mut out = x.to_owned();
        for (mut row, &d) in out.rows_mut().into_iter().zip(self.diag.iter()) {
            row.mapv_inplace(|v| v * d);
        }
        if n == 0 {
            return Ok(out);
        }

        // lower triangle contribution
        let mut f = Array2::<F>::zeros((self.rank(), x.ncols()));
        for i in 1..n {
            f = self.a(i).dot(&(f + outer(&self.q.row(i - 1), &x.row(i - 1))));
            let mut row = out.row_mut(i);
            row += &self.p.row(i).dot(&f);
        }

        // upper triangle contribution
        let mut g = Array2::<F>::zeros((self.rank(), x.ncols()));
        for i in (0..n - 1).rev() {
            g = self.a(i + 1)
                .t()
                .dot(&(g + outer(&self.p.row(i + 1), &x.row(i + 1))));
            let mut row = out.row_mut(i);
            row += &self.q.row(i).dot(&g);
        }
        Ok(out)
    }

    /// Matrix vector product `K x`
    pub fn apply_vec(&self, x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<Array1<F>> {
        let res = self.apply(&x.view().insert_axis(Axis(1)))?;
        Ok(res.remove_axis(Axis(1)))
    }

    /// LDL^T factorization of the matrix, see [QsmFactor]
    pub fn factorize(self) -> Result<QsmFactor<F>> {
        debug!(
            "Factorize quasiseparable matrix of size {} and rank {}",
            self.len(),
            self.rank()
        );
        QsmFactor::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{Exp, Matern32, Matern52, Sho};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand_xoshiro::Xoshiro256Plus;

    fn sorted_inputs(n: usize) -> Array1<f64> {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let mut x = Array::random_using(n, Uniform::new(0., 10.), &mut rng).to_vec();
        x.sort_by(|a, b| a.partial_cmp(b).unwrap());
        Array1::from_vec(x)
    }

    #[test]
    fn test_get_matches_dense() {
        let x = sorted_inputs(12);
        let qsm = Sho::new(1.0, 1.3, 4.0).to_symm_qsm(&x).unwrap();
        let dense = qsm.to_dense();
        for i in 0..12 {
            for j in 0..12 {
                assert_abs_diff_eq!(qsm.get(i, j), dense[[i, j]], epsilon = 1e-12);
            }
        }
        assert_abs_diff_eq!(dense, dense.t(), epsilon = 1e-14);
    }

    #[test]
    fn test_apply_matches_dense() {
        let x = sorted_inputs(30);
        let kernel = Sho::new(1.0, 2.0, 0.8) + Matern52::new(0.5, 1.4);
        let qsm = kernel.to_symm_qsm(&x).unwrap();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let b = Array::random_using((30, 3), Uniform::new(-1., 1.), &mut rng);
        let expected = qsm.to_dense().dot(&b);
        assert_abs_diff_eq!(qsm.apply(&b).unwrap(), expected, epsilon = 1e-10);
        let bv = b.column(1).to_owned();
        assert_abs_diff_eq!(
            qsm.apply_vec(&bv).unwrap(),
            expected.column(1),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_sum_and_product_of_matrices() {
        let x = sorted_inputs(15);
        let k1 = Matern32::new(1.2, 0.7);
        let k2 = Exp::new(0.8, 2.0);
        let q1 = k1.to_symm_qsm(&x).unwrap();
        let q2 = k2.to_symm_qsm(&x).unwrap();
        let (d1, d2) = (q1.to_dense(), q2.to_dense());

        let sum = q1.sum(&q2).unwrap();
        assert_eq!(sum.rank(), 3);
        assert_abs_diff_eq!(sum.to_dense(), &d1 + &d2, epsilon = 1e-12);

        let prod = q1.product(&q2).unwrap();
        assert_eq!(prod.rank(), 2);
        assert_abs_diff_eq!(prod.to_dense(), &d1 * &d2, epsilon = 1e-12);

        let scaled = q1.scale(3.0);
        assert_abs_diff_eq!(scaled.to_dense(), d1 * 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_shape_errors() {
        let k = Matern32::new(1.0, 1.0);
        let q1 = k.to_symm_qsm(&array![0., 1., 2.]).unwrap();
        let q2 = k.to_symm_qsm(&array![0., 1.]).unwrap();
        assert!(matches!(q1.sum(&q2), Err(GpError::ShapeError(_))));
        assert!(matches!(q1.product(&q2), Err(GpError::ShapeError(_))));
        assert!(matches!(
            q1.with_diagonal(&array![1., 1.]),
            Err(GpError::ShapeError(_))
        ));
        assert!(matches!(
            q1.with_diagonal(&array![1., -1., 1.]),
            Err(GpError::InvalidValueError(_))
        ));
        assert!(matches!(
            q1.apply(&Array2::<f64>::ones((2, 1))),
            Err(GpError::ShapeError(_))
        ));
    }

    #[test]
    fn test_unsorted_inputs() {
        let k = Matern32::new(1.0, 1.0);
        assert!(matches!(
            k.to_symm_qsm(&array![0., 2., 1.]),
            Err(GpError::DomainError(_))
        ));
    }

    #[test]
    fn test_with_diagonal() {
        let k = Exp::new(1.0, 1.0);
        let qsm = k.to_symm_qsm(&array![0., 0.5, 3.]).unwrap();
        let noisy = qsm.with_diagonal(&array![0.1, 0.2, 0.3]).unwrap();
        assert_abs_diff_eq!(noisy.diag(), array![1.1, 1.2, 1.3], epsilon = 1e-14);
        assert_abs_diff_eq!(noisy.get(2, 0), qsm.get(2, 0));
    }
}
