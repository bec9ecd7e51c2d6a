use anyhow::Result;
use glmkit::{FitError, FitResult, cluster_robust_vcov, fit_logistic, fit_ols};
use ndarray::{Array1, Array2, ArrayView1};
use tracing::{debug, warn};

use crate::association::{FitSettings, outcome_applicable};
use crate::data::StratumData;
use crate::design::{Design, complete_design};
use crate::filter::filter_mediation;
use crate::parallel::par_map_ordered;
use crate::types::{EffectEstimate, MediationRecord, OutcomeDef, OutcomeStatus};

// Columns of the expanded outcome model: intercept, x0 (direct path),
// x1 (mediator path), then covariates.
const X0: usize = 1;
const X1: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NaturalEffects {
    pub direct: EffectEstimate,
    pub indirect: EffectEstimate,
    pub n_obs: usize,
}

/// The second exposure level each subject is contrasted with.
///
/// A 0/1 factor is flipped; a continuous factor is reflected about its mean,
/// which keeps the contrast centred on the observed distribution.
pub fn alternative_levels(x: ArrayView1<f64>) -> Array1<f64> {
    let binary = x.iter().all(|v| *v == 0.0 || *v == 1.0);
    if binary {
        return x.mapv(|v| 1.0 - v);
    }
    let mean = x.mean().unwrap_or(0.0);
    x.mapv(|v| 2.0 * mean - v)
}

/// Natural direct and indirect effects (log-odds scale) of `factor` on a
/// binary `outcome` through `mediator`, by mediator-density weighting.
///
/// Each complete subject contributes two rows to the expanded data. Both
/// carry the observed exposure as `x0`; the first also uses it as `x1`, the
/// second uses the alternative level and is weighted by the ratio of the
/// mediator model densities at `x1` and at the observed exposure. A weighted
/// logistic model `y ~ x0 + x1 + covariates` then gives the direct effect on
/// `x0` and the indirect effect on `x1`, with standard errors clustered on
/// subject.
pub fn estimate_natural_effects(
    factor: &[f64],
    mediator: &[f64],
    outcome: &[f64],
    covariates: &[Vec<f64>],
    settings: FitSettings,
) -> FitResult<NaturalEffects> {
    let design = outcome_design(factor, mediator, outcome, covariates);
    effects_on_design(&design, outcome, settings)
}

// Mediator design restricted to subjects whose outcome is observed.
fn outcome_design(
    factor: &[f64],
    mediator: &[f64],
    outcome: &[f64],
    covariates: &[Vec<f64>],
) -> Design {
    let masked: Vec<f64> = mediator
        .iter()
        .zip(outcome)
        .map(|(m, y)| if y.is_finite() { *m } else { f64::NAN })
        .collect();
    complete_design(&masked, factor, covariates)
}

fn effects_on_design(
    design: &Design,
    outcome: &[f64],
    settings: FitSettings,
) -> FitResult<NaturalEffects> {
    let n = design.n_obs();
    let p = design.x.ncols();

    let mediator_fit = fit_ols(design.x.view(), design.y.view())?;
    let sigma = mediator_fit.sigma();
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(FitError::Singular);
    }
    let alpha = &mediator_fit.coefficients;
    let fitted_observed = design.x.dot(alpha);

    let x_obs = design.x.column(Design::FACTOR);
    let x_alt = alternative_levels(x_obs);

    let mut x = Array2::<f64>::zeros((2 * n, p + 1));
    let mut y = Array1::<f64>::zeros(2 * n);
    let mut w = Array1::<f64>::ones(2 * n);
    let mut clusters = Vec::with_capacity(2 * n);
    let two_var = 2.0 * sigma * sigma;

    for r in 0..n {
        let m = design.y[r];
        let response = outcome[design.rows[r]];
        let resid_obs = m - fitted_observed[r];
        let mu_alt = fitted_observed[r] + alpha[Design::FACTOR] * (x_alt[r] - x_obs[r]);
        let resid_alt = m - mu_alt;

        for (k, x1) in [x_obs[r], x_alt[r]].into_iter().enumerate() {
            let row = 2 * r + k;
            x[(row, 0)] = 1.0;
            x[(row, X0)] = x_obs[r];
            x[(row, X1)] = x1;
            for j in 2..p {
                x[(row, j + 1)] = design.x[(r, j)];
            }
            y[row] = response;
            if k == 1 {
                w[row] = (-(resid_alt * resid_alt - resid_obs * resid_obs) / two_var).exp();
            }
            clusters.push(r);
        }
    }
    if w.iter().any(|v| !v.is_finite()) {
        return Err(FitError::Singular);
    }

    let fit = fit_logistic(x.view(), y.view(), Some(w.view()), settings.irls)?;
    let vcov = cluster_robust_vcov(&fit, x.view(), y.view(), Some(w.view()), &clusters)?;
    let direct = fit.coefficient_with(X0, &vcov, settings.level);
    let indirect = fit.coefficient_with(X1, &vcov, settings.level);
    if !direct.is_finite() || !indirect.is_finite() {
        return Err(FitError::Singular);
    }

    Ok(NaturalEffects {
        direct: direct.into(),
        indirect: indirect.into(),
        n_obs: n,
    })
}

/// Stage-2 result for one (factor, outcome, stratum).
#[derive(Debug, Clone)]
pub struct OutcomeResult {
    pub outcome: String,
    pub status: OutcomeStatus,
    /// One record per candidate, in candidate order, adjusted p-values attached.
    pub records: Vec<MediationRecord>,
    pub significant: Vec<MediationRecord>,
}

fn mediate_candidate(
    data: &StratumData,
    factor: &[f64],
    outcome: &[f64],
    mediator_id: &str,
    settings: FitSettings,
) -> MediationRecord {
    let Some(mediator) = data.mediators.column(mediator_id) else {
        return MediationRecord::failed(
            mediator_id,
            0,
            format!("mediator not measured in stratum {}", data.stratum),
        );
    };
    let design = outcome_design(factor, mediator, outcome, data.covariates.columns());
    match effects_on_design(&design, outcome, settings) {
        Ok(effects) => MediationRecord {
            mediator: mediator_id.to_string(),
            direct: effects.direct,
            indirect: effects.indirect,
            n_obs: effects.n_obs,
            fit_error: None,
        },
        Err(err) => MediationRecord::failed(mediator_id, design.n_obs(), err.to_string()),
    }
}

/// Stage 2 over every candidate for one outcome. Per-candidate fit failures
/// become missing-value records; an outcome with no data in the stratum is
/// not applicable and never reaches the solver.
pub fn run_outcome(
    data: &StratumData,
    factor_id: &str,
    candidates: &[String],
    outcome: &OutcomeDef,
    settings: FitSettings,
    threshold: f64,
) -> Result<OutcomeResult> {
    if !outcome_applicable(data, outcome) {
        debug!("{factor_id} -> {}: not applicable in {}", outcome.id, data.stratum);
        return Ok(OutcomeResult {
            outcome: outcome.id.clone(),
            status: OutcomeStatus::NotApplicable,
            records: Vec::new(),
            significant: Vec::new(),
        });
    }
    if candidates.is_empty() {
        return Ok(OutcomeResult {
            outcome: outcome.id.clone(),
            status: OutcomeStatus::NoCandidates,
            records: Vec::new(),
            significant: Vec::new(),
        });
    }

    let factor = data.factors.require(factor_id)?;
    let values = data.outcomes.require(&outcome.id)?;

    let mut records = par_map_ordered(settings.threads, candidates.len(), "stage-2", |idx| {
        let record = mediate_candidate(data, factor, values, &candidates[idx], settings);
        if let Some(reason) = &record.fit_error {
            warn!(
                "{factor_id} -> {} -> {} ({}): {reason}",
                candidates[idx], outcome.id, data.stratum
            );
        }
        Ok(record)
    })?;

    let significant = filter_mediation(&mut records, threshold);
    Ok(OutcomeResult {
        outcome: outcome.id.clone(),
        status: OutcomeStatus::Completed,
        records,
        significant,
    })
}
