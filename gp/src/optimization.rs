use crate::errors::{GpError, Result};
use crate::GP_COBYLA_MIN_EVAL;
use finitediff::FiniteDiff;
use linfa::Float;
use ndarray::{Array1, Array2, Zip};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::cell::RefCell;

pub(crate) struct CobylaParams {
    pub rhobeg: f64,
    pub ftol_rel: f64,
    pub maxeval: usize,
}

impl Default for CobylaParams {
    fn default() -> Self {
        CobylaParams {
            rhobeg: 0.5,
            ftol_rel: 1e-4,
            maxeval: crate::GP_COBYLA_MAX_EVAL,
        }
    }
}

/// Starting points in log10 space: the kernel current parameters then
/// `n_start` points drawn uniformly within log10 bounds.
pub(crate) fn prepare_multistart<F: Float>(
    n_start: usize,
    params0: &Array1<F>,
    bounds: &[(F, F)],
) -> (Array2<F>, Vec<(F, F)>) {
    let bounds: Vec<(F, F)> = bounds
        .iter()
        .map(|(lo, up)| (lo.log10(), up.log10()))
        .collect();

    let mut params0s = Array2::zeros((n_start + 1, params0.len()));
    // clip the initial guess within bounds
    Zip::from(params0s.row_mut(0))
        .and(params0)
        .and(&bounds)
        .for_each(|p, v, (lo, up)| {
            let v = v.log10();
            *p = if v < *lo {
                *lo
            } else if v > *up {
                *up
            } else {
                v
            }
        });

    // seeded for reproducibility, starts only need to spread over the box
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    for mut row in params0s.rows_mut().into_iter().skip(1) {
        Zip::from(&mut row).and(&bounds).for_each(|p, (lo, up)| {
            *p = if lo < up {
                F::cast(rng.gen_range(into_f64(lo)..into_f64(up)))
            } else {
                *lo
            }
        });
    }
    (params0s, bounds)
}

/// Optimize gp hyper parameters given an initial guess and bounds with cobyla
pub(crate) fn optimize_params<ObjF, F>(
    objfn: ObjF,
    param0: &Array1<F>,
    bounds: &[(F, F)],
    cobyla: CobylaParams,
) -> (f64, Array1<f64>)
where
    ObjF: Fn(&[f64], Option<&mut [f64]>, &mut ()) -> f64,
    F: Float,
{
    use cobyla::{minimize, FailStatus, Func, RhoBeg, StopTols};

    let cons: Vec<&dyn Func<()>> = vec![];
    let param0: Vec<f64> = param0.iter().map(into_f64).collect();

    let bounds: Vec<_> = bounds
        .iter()
        .map(|(lo, up)| (into_f64(lo), into_f64(up)))
        .collect();

    let res = minimize(
        |x, u| objfn(x, None, u),
        &param0,
        &bounds,
        &cons,
        (),
        cobyla.maxeval,
        RhoBeg::All(cobyla.rhobeg),
        Some(StopTols {
            ftol_rel: cobyla.ftol_rel,
            ..StopTols::default()
        }),
    );
    let x_opt = match res {
        Ok((_, x_opt, _)) => x_opt,
        Err((FailStatus::RoundoffLimited, x_opt, _)) => {
            log::debug!("Cobyla optimizer in GP limited by roundoff errors");
            x_opt
        }
        Err((status, x_opt, _)) => {
            log::warn!("ERROR Cobyla optimizer in GP status={status:?}");
            x_opt
        }
    };
    // the returned point may still be usable whatever the status
    let fval = objfn(&x_opt, None, &mut ());
    let fval = if fval.is_finite() { fval } else { f64::INFINITY };
    (fval, Array1::from_vec(x_opt))
}

/// Evaluation budget of one optimization: 10 evaluations per parameter, within
/// `[GP_COBYLA_MIN_EVAL, max_eval]`. A `max_eval` below the minimum is raised to it.
pub(crate) fn cobyla_max_eval(n_params: usize, max_eval: usize) -> usize {
    (10 * n_params)
        .max(GP_COBYLA_MIN_EVAL)
        .min(max_eval.max(GP_COBYLA_MIN_EVAL))
}

/// Central finite differences gradient of `lkh` with respect to the natural logarithm
/// of the strictly positive `params`.
///
/// The first error raised by a perturbed evaluation is returned as is.
pub(crate) fn log_likelihood_gradient<F, L>(params: &[F], lkh: L) -> Result<Array1<F>>
where
    F: Float,
    L: Fn(&[F]) -> Result<F>,
{
    let failure: RefCell<Option<GpError>> = RefCell::new(None);
    let log_params: Vec<f64> = params.iter().map(|p| into_f64(&p.ln())).collect();
    let f = |t: &Vec<f64>| -> f64 {
        let params: Vec<F> = t.iter().map(|v| F::cast(v.exp())).collect();
        match lkh(&params) {
            Ok(v) => into_f64(&v),
            Err(err) => {
                failure.borrow_mut().get_or_insert(err);
                f64::NAN
            }
        }
    };
    let grad = log_params.central_diff(&f);
    if let Some(err) = failure.into_inner() {
        return Err(err);
    }
    if let Some(i) = grad.iter().position(|g| !g.is_finite()) {
        return Err(GpError::InvalidValueError(format!(
            "non finite log likelihood derivative for parameter {i}"
        )));
    }
    Ok(grad.into_iter().map(F::cast).collect())
}

#[inline(always)]
pub(crate) fn into_f64<F: Float>(v: &F) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_prepare_multistart() {
        let (starts, bounds) =
            prepare_multistart(5, &array![1e-5, 10.0], &[(1e-3, 1e3), (1e-2, 1e2)]);
        assert_eq!(starts.dim(), (6, 2));
        assert_abs_diff_eq!(bounds[0].0, -3., epsilon = 1e-12);
        assert_abs_diff_eq!(bounds[1].1, 2., epsilon = 1e-12);
        // initial guess clipped within bounds
        assert_abs_diff_eq!(starts.row(0), array![-3., 1.], epsilon = 1e-12);
        for row in starts.rows() {
            assert!(row[0] >= bounds[0].0 && row[0] <= bounds[0].1);
            assert!(row[1] >= bounds[1].0 && row[1] <= bounds[1].1);
        }
    }

    #[test]
    fn test_log_likelihood_gradient() {
        // l(p) = -(ln p0 - 1)^2 + 3 ln p1
        let lkh = |p: &[f64]| -> Result<f64> { Ok(-(p[0].ln() - 1.).powi(2) + 3. * p[1].ln()) };
        let grad = log_likelihood_gradient(&[1.0, 2.0], lkh).unwrap();
        assert_abs_diff_eq!(grad, array![2.0, 3.0], epsilon = 1e-6);
    }

    #[test]
    fn test_log_likelihood_gradient_propagates_errors() {
        // fails as soon as the first parameter exceeds 1
        let lkh = |p: &[f64]| -> Result<f64> {
            if p[0] > 1.0 {
                Err(GpError::NumericalError {
                    index: 3,
                    pivot: -1e-12,
                })
            } else {
                Ok(p[0])
            }
        };
        match log_likelihood_gradient(&[1.0], lkh) {
            Err(GpError::NumericalError { index, .. }) => assert_eq!(index, 3),
            other => panic!("expected a numerical error, got {other:?}"),
        }
        let infinite = |_: &[f64]| -> Result<f64> { Ok(f64::INFINITY) };
        assert!(matches!(
            log_likelihood_gradient(&[1.0], infinite),
            Err(GpError::InvalidValueError(_))
        ));
    }

    #[test]
    fn test_cobyla_max_eval() {
        assert_eq!(cobyla_max_eval(3, 1000), GP_COBYLA_MIN_EVAL.max(30));
        assert_eq!(cobyla_max_eval(200, 1000), 1000);
        assert_eq!(cobyla_max_eval(200, 500), 500);
        // budget below the minimum, e.g. from deserialized parameters
        assert_eq!(cobyla_max_eval(3, 0), GP_COBYLA_MIN_EVAL);
        assert_eq!(cobyla_max_eval(200, 1), GP_COBYLA_MIN_EVAL);
    }

    #[test]
    fn test_optimize_quadratic() {
        let objfn = |x: &[f64], _: Option<&mut [f64]>, _: &mut ()| -> f64 {
            (x[0] - 0.5).powi(2) + (x[1] + 1.0).powi(2)
        };
        let (fmin, xopt) = optimize_params(
            objfn,
            &array![0.0, 0.0],
            &[(-2., 2.), (-2., 2.)],
            CobylaParams::default(),
        );
        assert!(fmin < 1e-3);
        assert_abs_diff_eq!(xopt, array![0.5, -1.0], epsilon = 5e-2);
    }

    #[test]
    fn test_optimize_from_optimum_keeps_value() {
        // starting on the minimum, cobyla soon stalls on roundoff
        let objfn = |x: &[f64], _: Option<&mut [f64]>, _: &mut ()| -> f64 {
            (x[0] - 0.5).powi(2) + 1.0
        };
        let (fmin, xopt) = optimize_params(
            objfn,
            &array![0.5],
            &[(-2., 2.)],
            CobylaParams::default(),
        );
        assert!(fmin.is_finite());
        assert_abs_diff_eq!(fmin, 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(xopt[0], 0.5, epsilon = 5e-2);
    }
}
