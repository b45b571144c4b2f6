use crate::errors::{GpError, Result};
use linfa::Float;
use ndarray::{s, Array1, Array2, ArrayBase, Data, Ix1, Ix2};

/// Check that coordinates are finite and sorted in ascending order.
///
/// Equal consecutive values are accepted: the corresponding transition is the identity.
pub fn check_sorted<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Result<()> {
    if let Some(i) = x.iter().position(|v| !v.is_finite()) {
        return Err(GpError::DomainError(format!(
            "input coordinate at position {i} is not finite"
        )));
    }
    for i in 1..x.len() {
        if x[i] < x[i - 1] {
            return Err(GpError::DomainError(format!(
                "input coordinates must be sorted in ascending order, got {} after {} at position {}",
                x[i],
                x[i - 1],
                i
            )));
        }
    }
    Ok(())
}

/// Check the given training input matrix is a (n, 1) column and extract it
pub(crate) fn as_column<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
    if x.ncols() != 1 {
        return Err(GpError::DomainError(format!(
            "quasiseparable kernels work on one-dimensional inputs, got {} columns",
            x.ncols()
        )));
    }
    Ok(x.column(0).to_owned())
}

/// Origin of a coordinate in a merged train/test sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Index in the (sorted) training inputs
    Train(usize),
    /// Index in the test inputs as given by the caller
    Test(usize),
}

/// Training and test coordinates merged into one ascending sequence,
/// each merged position remembering where it comes from.
#[derive(Debug)]
pub(crate) struct MergedInputs<F: Float> {
    pub coords: Array1<F>,
    pub origins: Vec<Origin>,
}

impl<F: Float> MergedInputs<F> {
    /// Merge sorted training inputs with test inputs given in any order.
    /// On ties the training input comes first.
    pub fn new(
        xtrain: &ArrayBase<impl Data<Elem = F>, Ix1>,
        xtest: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<MergedInputs<F>> {
        if let Some(i) = xtest.iter().position(|v| !v.is_finite()) {
            return Err(GpError::DomainError(format!(
                "test coordinate at position {i} is not finite"
            )));
        }
        let mut order: Vec<usize> = (0..xtest.len()).collect();
        // finite values are totally ordered
        order.sort_by(|&a, &b| {
            xtest[a]
                .partial_cmp(&xtest[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let n = xtrain.len() + xtest.len();
        let mut coords = Vec::with_capacity(n);
        let mut origins = Vec::with_capacity(n);
        let (mut i, mut k) = (0, 0);
        while i < xtrain.len() || k < order.len() {
            let take_train = match (i < xtrain.len(), k < order.len()) {
                (true, true) => xtrain[i] <= xtest[order[k]],
                (true, false) => true,
                _ => false,
            };
            if take_train {
                coords.push(xtrain[i]);
                origins.push(Origin::Train(i));
                i += 1;
            } else {
                coords.push(xtest[order[k]]);
                origins.push(Origin::Test(order[k]));
                k += 1;
            }
        }
        Ok(MergedInputs {
            coords: Array1::from_vec(coords),
            origins,
        })
    }
}

/// Outer product `a b^T`
pub(crate) fn outer<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix1>,
    b: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Array2<F> {
    let mut res = Array2::zeros((a.len(), b.len()));
    for (mut row, &ai) in res.rows_mut().into_iter().zip(a.iter()) {
        row.assign(&b.mapv(|bj| ai * bj));
    }
    res
}

/// Block diagonal matrix `diag(a, b)`
pub(crate) fn block_diag<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix2>,
    b: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    let (na, ma) = a.dim();
    let (nb, mb) = b.dim();
    let mut res = Array2::zeros((na + nb, ma + mb));
    res.slice_mut(s![..na, ..ma]).assign(a);
    res.slice_mut(s![na.., ma..]).assign(b);
    res
}

/// Kronecker product of two vectors
pub(crate) fn kron_vec<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix1>,
    b: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Array1<F> {
    a.iter()
        .flat_map(|&ai| b.iter().map(move |&bj| ai * bj))
        .collect()
}
