use ndarray::{ArrayView1, ArrayView2};
use tracing::trace;

use crate::linalg::{spd_inverse, spd_solve};
use crate::types::{FitError, FitResult, OlsFit};

/// Ordinary least squares of `y` on the columns of `x` (intercept included by the caller).
pub fn fit_ols(x: ArrayView2<f64>, y: ArrayView1<f64>) -> FitResult<OlsFit> {
    let (n, p) = x.dim();
    if y.len() != n {
        return Err(FitError::Dimension(format!(
            "design has {n} rows but response has {}",
            y.len()
        )));
    }
    if n <= p {
        return Err(FitError::TooFewObservations {
            observed: n,
            parameters: p,
        });
    }

    let xtx = x.t().dot(&x);
    let beta = spd_solve(xtx.view(), x.t().dot(&y).view())?;
    let xtx_inv = spd_inverse(xtx.view())?;

    let resid = &y - &x.dot(&beta);
    let rss = resid.dot(&resid);
    let df_resid = n - p;
    let sigma2 = rss / df_resid as f64;
    if !sigma2.is_finite() {
        return Err(FitError::Singular);
    }
    trace!("ols: n={n}, p={p}, rss={rss}, sigma2={sigma2}");

    Ok(OlsFit {
        coefficients: beta,
        vcov: xtx_inv * sigma2,
        sigma2,
        df_resid,
        n_obs: n,
    })
}
