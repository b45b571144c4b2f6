//! LDL^T factorization of symmetric quasiseparable matrices.
//!
//! For a [SymmQsm] `K` with components `(d, p, q, a)`, the unit lower triangular
//! factor `L` is itself quasiseparable, `L_ij = p_i^T a_i ... a_{j+1} w_j` for `i > j`,
//! so the factorization only computes the pivots `D` and the N x J matrix `w`.
//! Every sweep below is a sequential loop carrying a J x J (or J x K) state.

use crate::errors::{GpError, Result};
use crate::qsm::SymmQsm;
use crate::utils::outer;
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix1, Ix2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Factorization `K = L D L^T` of a symmetric positive definite quasiseparable matrix
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct QsmFactor<F: Float> {
    /// Factorized matrix
    matrix: SymmQsm<F>,
    /// Pivots D (N)
    pivots: Array1<F>,
    /// Right factors of L (N, J)
    w: Array2<F>,
}

impl<F: Float> QsmFactor<F> {
    /// Factorize `matrix` in O(N J^2).
    ///
    /// Returns a [GpError::NumericalError] at the first pivot which is not
    /// strictly positive (or NaN): the matrix is not positive definite.
    pub fn new(matrix: SymmQsm<F>) -> Result<QsmFactor<F>> {
        let (n, rank) = (matrix.len(), matrix.rank());
        let mut pivots = Array1::zeros(n);
        let mut w = Array2::zeros((n, rank));
        let mut s = Array2::<F>::zeros((rank, rank));
        for i in 0..n {
            if i > 0 {
                let wd = outer(&w.row(i - 1), &w.row(i - 1)).mapv(|v| v * pivots[i - 1]);
                let a = matrix.a(i);
                s = a.dot(&(s + wd)).dot(&a.t());
            }
            let u = matrix.p.row(i);
            let su = s.dot(&u);
            let pivot = matrix.diag[i] - u.dot(&su);
            if pivot.is_nan() || pivot <= F::zero() {
                return Err(GpError::NumericalError {
                    index: i,
                    pivot: pivot.to_f64().unwrap_or(f64::NAN),
                });
            }
            pivots[i] = pivot;
            w.row_mut(i)
                .assign(&(&matrix.q.row(i) - &su).mapv(|v| v / pivot));
        }
        Ok(QsmFactor { matrix, pivots, w })
    }

    /// The factorized matrix
    pub fn matrix(&self) -> &SymmQsm<F> {
        &self.matrix
    }

    /// Pivots D of the factorization
    pub fn pivots(&self) -> ArrayView1<F> {
        self.pivots.view()
    }

    /// Size N of the factorized system
    pub fn len(&self) -> usize {
        self.pivots.len()
    }

    /// Whether the factorized system is empty
    pub fn is_empty(&self) -> bool {
        self.pivots.is_empty()
    }

    fn check_rhs(&self, nrows: usize) -> Result<()> {
        if nrows != self.len() {
            return Err(GpError::ShapeError(format!(
                "right hand side with {} rows expected, got {}",
                self.len(),
                nrows
            )));
        }
        Ok(())
    }

    /// Forward substitution `L^-1 b`
    fn forward(&self, b: &ArrayView2<F>) -> Array2<F> {
        let n = self.len();
        let mut z = b.to_owned();
        let mut f = Array2::<F>::zeros((self.matrix.rank(), b.ncols()));
        for i in 1..n {
            f = self
                .matrix
                .a(i)
                .dot(&(f + outer(&self.w.row(i - 1), &z.row(i - 1))));
            let mut row = z.row_mut(i);
            row -= &self.matrix.p.row(i).dot(&f);
        }
        z
    }

    /// Backward substitution `L^-T y`
    fn backward(&self, y: Array2<F>) -> Array2<F> {
        let n = self.len();
        let mut x = y;
        if n == 0 {
            return x;
        }
        let mut g = Array2::<F>::zeros((self.matrix.rank(), x.ncols()));
        for i in (0..n - 1).rev() {
            g = self
                .matrix
                .a(i + 1)
                .t()
                .dot(&(g + outer(&self.matrix.p.row(i + 1), &x.row(i + 1))));
            let mut row = x.row_mut(i);
            row -= &self.w.row(i).dot(&g);
        }
        x
    }

    fn scale_rows(&self, x: &mut Array2<F>, op: impl Fn(F) -> F) {
        for (mut row, &d) in x.rows_mut().into_iter().zip(self.pivots.iter()) {
            let s = op(d);
            row.mapv_inplace(|v| v * s);
        }
    }

    /// Solve `K x = b` for a (N, K) right hand side in O(N J (J + K))
    pub fn solve(&self, b: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        self.check_rhs(b.nrows())?;
        let mut z = self.forward(&b.view());
        self.scale_rows(&mut z, |d| F::one() / d);
        Ok(self.backward(z))
    }

    /// Solve `K x = b` for a vector `b`
    pub fn solve_vec(&self, b: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<Array1<F>> {
        let x = self.solve(&b.view().insert_axis(Axis(1)))?;
        Ok(x.remove_axis(Axis(1)))
    }

    /// Log determinant of the matrix, `sum(ln D)`
    pub fn log_determinant(&self) -> F {
        self.pivots.mapv(|d| d.ln()).sum()
    }

    /// Half of the log determinant, the normalization term of a gaussian density
    pub fn half_log_determinant(&self) -> F {
        F::cast(0.5) * self.log_determinant()
    }

    /// Whitening `D^-1/2 L^-1 b`: if `b ~ N(0, K)` then the result is standard normal.
    /// Besides `|apply_inverse_sqrt(b)|^2 = b^T K^-1 b`.
    pub fn apply_inverse_sqrt(
        &self,
        b: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array2<F>> {
        self.check_rhs(b.nrows())?;
        let mut z = self.forward(&b.view());
        self.scale_rows(&mut z, |d| F::one() / d.sqrt());
        Ok(z)
    }

    /// Coloring `L D^1/2 z`: if `z` is standard normal the result follows `N(0, K)`
    pub fn apply_sqrt(&self, z: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        self.check_rhs(z.nrows())?;
        let n = self.len();
        let mut y = z.to_owned();
        self.scale_rows(&mut y, |d| d.sqrt());
        let mut out = y.clone();
        let mut f = Array2::<F>::zeros((self.matrix.rank(), y.ncols()));
        for i in 1..n {
            f = self
                .matrix
                .a(i)
                .dot(&(f + outer(&self.w.row(i - 1), &y.row(i - 1))));
            let mut row = out.row_mut(i);
            row += &self.matrix.p.row(i).dot(&f);
        }
        Ok(out)
    }
}
