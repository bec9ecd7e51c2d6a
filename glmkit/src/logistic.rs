use ndarray::{Array1, ArrayView1, ArrayView2};
use tracing::{debug, trace};

use crate::linalg::{spd_inverse, spd_solve, weighted_crossprod};
use crate::types::{FitError, FitResult, IrlsControl, LogisticFit};

// Fitted probabilities closer than this to 0 or 1 are treated as separation.
const PROB_EPS: f64 = 1e-10;
const VAR_FLOOR: f64 = 1e-12;

/// Binomial GLM with logit link fitted by iteratively reweighted least squares.
///
/// `y` holds responses in `[0, 1]`; `weights` are optional prior weights
/// (frequency or importance weights, all non-negative). Convergence follows
/// the relative deviance change criterion used by R's `glm.fit`.
pub fn fit_logistic(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    weights: Option<ArrayView1<f64>>,
    control: IrlsControl,
) -> FitResult<LogisticFit> {
    let (n, p) = x.dim();
    if y.len() != n {
        return Err(FitError::Dimension(format!(
            "design has {n} rows but response has {}",
            y.len()
        )));
    }
    let w: Array1<f64> = match weights {
        Some(w) if w.len() == n => w.to_owned(),
        Some(w) => {
            return Err(FitError::Dimension(format!(
                "design has {n} rows but weights have {}",
                w.len()
            )));
        }
        None => Array1::ones(n),
    };
    if w.iter().any(|v| !v.is_finite() || *v < 0.0) || y.iter().any(|v| !(0.0..=1.0).contains(v)) {
        return Err(FitError::Dimension(
            "weights must be finite and non-negative, responses in [0, 1]".to_string(),
        ));
    }

    let n_eff = w.iter().filter(|v| **v > 0.0).count();
    if n_eff <= p {
        return Err(FitError::TooFewObservations {
            observed: n_eff,
            parameters: p,
        });
    }
    let total: f64 = w.sum();
    let events: f64 = w.iter().zip(y.iter()).map(|(wi, yi)| wi * yi).sum();
    if events <= 0.0 || events >= total {
        return Err(FitError::DegenerateResponse);
    }

    let mut beta = Array1::<f64>::zeros(p);
    let mut eta = x.dot(&beta);
    let mut mu = eta.mapv(inv_logit);
    let mut dev_old = deviance(y, mu.view(), w.view());
    let mut converged = false;
    let mut iterations = 0;

    for iter in 1..=control.max_iter {
        iterations = iter;
        let var = mu.mapv(|m| (m * (1.0 - m)).max(VAR_FLOOR));
        let working_w = &w * &var;
        let z = &eta + &((&y - &mu) / &var);
        let xtwx = weighted_crossprod(x, working_w.view());
        let xtwz = x.t().dot(&(&working_w * &z));
        beta = spd_solve(xtwx.view(), xtwz.view())?;
        if beta.iter().any(|b| !b.is_finite()) {
            return Err(FitError::NonConvergence(iter));
        }

        eta = x.dot(&beta);
        mu = eta.mapv(inv_logit);
        let dev = deviance(y, mu.view(), w.view());
        trace!("irls: iter={iter}, deviance={dev}");
        if (dev - dev_old).abs() / (dev.abs() + 0.1) < control.tol {
            converged = true;
            break;
        }
        dev_old = dev;
    }

    if !converged {
        debug!("irls: no convergence after {iterations} iterations");
        return Err(FitError::NonConvergence(iterations));
    }
    if mu
        .iter()
        .zip(w.iter())
        .any(|(m, wi)| *wi > 0.0 && (*m < PROB_EPS || *m > 1.0 - PROB_EPS))
    {
        return Err(FitError::Separation);
    }

    let var = mu.mapv(|m| (m * (1.0 - m)).max(VAR_FLOOR));
    let info = weighted_crossprod(x, (&w * &var).view());
    let vcov = spd_inverse(info.view())?;
    let dev = deviance(y, mu.view(), w.view());

    Ok(LogisticFit {
        coefficients: beta,
        vcov,
        fitted: mu,
        deviance: dev,
        iterations,
        n_obs: n_eff,
    })
}

pub fn inv_logit(eta: f64) -> f64 {
    if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        let e = eta.exp();
        e / (1.0 + e)
    }
}

fn deviance(y: ArrayView1<f64>, mu: ArrayView1<f64>, w: ArrayView1<f64>) -> f64 {
    let mut dev = 0.0;
    for ((yi, mi), wi) in y.iter().zip(mu.iter()).zip(w.iter()) {
        if *wi == 0.0 {
            continue;
        }
        let m = mi.clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON);
        let mut term = 0.0;
        if *yi > 0.0 {
            term += yi * (yi / m).ln();
        }
        if *yi < 1.0 {
            term += (1.0 - yi) * ((1.0 - yi) / (1.0 - m)).ln();
        }
        dev += 2.0 * wi * term;
    }
    dev
}
