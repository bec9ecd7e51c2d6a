use anyhow::Result;
use glmkit::{Coefficient, FitResult, IrlsControl, fit_logistic, fit_ols};
use tracing::{debug, info};

use crate::data::StratumData;
use crate::design::{Design, complete_design};
use crate::filter::apply_corrections;
use crate::parallel::par_map_ordered;
use crate::types::{AssociationRecord, OutcomeDef};

/// Settings shared by every fit of one screen.
#[derive(Debug, Clone, Copy)]
pub struct FitSettings {
    pub level: f64,
    pub irls: IrlsControl,
    pub threads: Option<usize>,
}

/// OLS of `mediator ~ factor + covariates` on the complete cases.
pub fn fit_mediator_association(
    factor: &[f64],
    mediator: &[f64],
    covariates: &[Vec<f64>],
    level: f64,
) -> (FitResult<Coefficient>, usize) {
    let design = complete_design(mediator, factor, covariates);
    let n = design.n_obs();
    let fit = fit_ols(design.x.view(), design.y.view())
        .map(|fit| fit.coefficient(Design::FACTOR, level));
    (fit, n)
}

/// Logistic `outcome ~ factor + covariates` on the complete cases.
pub fn fit_outcome_association(
    factor: &[f64],
    outcome: &[f64],
    covariates: &[Vec<f64>],
    level: f64,
    irls: IrlsControl,
) -> (FitResult<Coefficient>, usize) {
    let design = complete_design(outcome, factor, covariates);
    let n = design.n_obs();
    let fit = fit_logistic(design.x.view(), design.y.view(), None, irls)
        .map(|fit| fit.coefficient(Design::FACTOR, level));
    (fit, n)
}

fn to_record(id: &str, fit: (FitResult<Coefficient>, usize)) -> AssociationRecord {
    match fit {
        (Ok(coef), n) => AssociationRecord::from_coefficient(id, &coef, n),
        (Err(err), n) => {
            debug!("{id}: {err}");
            AssociationRecord::failed(id, n, err.to_string())
        }
    }
}

/// Stage 1: one record per mediator, in mediator order, with Bonferroni and
/// BH attached across all mediators of the stratum.
pub fn stage1_screen(
    data: &StratumData,
    factor_id: &str,
    settings: FitSettings,
) -> Result<Vec<AssociationRecord>> {
    let factor = data.factors.require(factor_id)?;
    let covariates = data.covariates.columns();
    let names = data.mediators.names();
    let columns = data.mediators.columns();

    let mut records = par_map_ordered(settings.threads, names.len(), "stage-1", |idx| {
        let fit = fit_mediator_association(factor, &columns[idx], covariates, settings.level);
        Ok(to_record(&names[idx], fit))
    })?;

    apply_corrections(&mut records);
    let failed = records.iter().filter(|r| r.fit_error.is_some()).count();
    info!(
        "Stage 1 {factor_id} ({}): {} mediators fitted, {failed} failed",
        data.stratum,
        records.len()
    );
    Ok(records)
}

/// An outcome has no data in this stratum when it is flagged for the other
/// sex or its vector is entirely missing.
pub fn outcome_applicable(data: &StratumData, outcome: &OutcomeDef) -> bool {
    outcome.sex.applies_to(data.stratum)
        && data
            .outcomes
            .column(&outcome.id)
            .is_some_and(|v| v.iter().any(|x| !x.is_nan()))
}

/// Total-effect screen: logistic `outcome ~ factor + covariates` for every
/// outcome. Not-applicable outcomes carry missing fields and stay out of the
/// correction family.
pub fn total_effect_screen(
    data: &StratumData,
    factor_id: &str,
    outcomes: &[OutcomeDef],
    settings: FitSettings,
) -> Result<Vec<AssociationRecord>> {
    let factor = data.factors.require(factor_id)?;
    let covariates = data.covariates.columns();

    let mut records = par_map_ordered(settings.threads, outcomes.len(), "total-effect", |idx| {
        let outcome = &outcomes[idx];
        if !outcome_applicable(data, outcome) {
            return Ok(AssociationRecord::failed(
                &outcome.id,
                0,
                "not applicable".to_string(),
            ));
        }
        let values = data.outcomes.require(&outcome.id)?;
        let fit =
            fit_outcome_association(factor, values, covariates, settings.level, settings.irls);
        Ok(to_record(&outcome.id, fit))
    })?;
    apply_corrections(&mut records);
    Ok(records)
}
