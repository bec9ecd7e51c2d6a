mod common;

use common::{bernoulli, catalog, inv_logit, normal, simulate_stratum};
use glmkit::IrlsControl;
use medscreen::association::FitSettings;
use medscreen::mediation::{alternative_levels, estimate_natural_effects, run_outcome};
use medscreen::types::{OutcomeStatus, Stratum};
use ndarray::array;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn settings() -> FitSettings {
    FitSettings {
        level: 0.95,
        irls: IrlsControl::default(),
        threads: Some(2),
    }
}

#[test]
fn alternative_levels_flip_binary_and_reflect_continuous() {
    let binary = alternative_levels(array![0.0, 1.0, 1.0].view());
    assert_eq!(binary, array![1.0, 0.0, 0.0]);
    let continuous = alternative_levels(array![1.0, 2.0, 6.0].view());
    assert_eq!(continuous, array![5.0, 4.0, 0.0]);
}

#[test]
fn indirect_effect_is_detected_through_a_true_mediator() {
    let n = 3000;
    let mut rng = StdRng::seed_from_u64(42);
    let x: Vec<f64> = (0..n).map(|_| bernoulli(&mut rng, 0.5)).collect();
    let c: Vec<f64> = (0..n).map(|_| normal(&mut rng)).collect();
    let m: Vec<f64> = (0..n)
        .map(|i| 1.0 * x[i] + 0.3 * c[i] + normal(&mut rng))
        .collect();
    let noise: Vec<f64> = (0..n).map(|i| 0.3 * c[i] + normal(&mut rng)).collect();
    let y: Vec<f64> = (0..n)
        .map(|i| bernoulli(&mut rng, inv_logit(-0.5 + 0.2 * x[i] + 0.8 * m[i] + 0.2 * c[i])))
        .collect();
    let covariates = vec![c];

    let effects = estimate_natural_effects(&x, &m, &y, &covariates, settings()).unwrap();
    assert_eq!(effects.n_obs, n);
    assert!(effects.indirect.estimate > 0.4, "{:?}", effects.indirect);
    assert!(effects.indirect.p_value < 1e-6);
    assert!(effects.indirect.ci_low < effects.indirect.estimate);
    assert!(effects.indirect.se > 0.0);

    let null = estimate_natural_effects(&x, &noise, &y, &covariates, settings()).unwrap();
    assert!(null.indirect.estimate.abs() < 0.15, "{:?}", null.indirect);
    assert!(null.direct.estimate > 0.4);
}

#[test]
fn missing_rows_are_dropped_before_both_models() {
    let data = simulate_stratum(Stratum::Combined, 400, 2, 8);
    let x = data.factors.require("E1").unwrap();
    let mut m = data.mediators.require("P1").unwrap().to_vec();
    let mut y = data.outcomes.require("D2").unwrap().to_vec();
    m[0] = f64::NAN;
    y[1] = f64::NAN;
    let effects =
        estimate_natural_effects(x, &m, &y, data.covariates.columns(), settings()).unwrap();
    assert_eq!(effects.n_obs, 398);
}

#[test]
fn failed_outcome_does_not_stop_other_outcomes() {
    let data = simulate_stratum(Stratum::Combined, 600, 3, 21);
    let outcomes = catalog().outcomes;
    let candidates = vec!["P1".to_string(), "P2".to_string(), "MISSING".to_string()];

    let d1 = run_outcome(&data, "E1", &candidates, &outcomes[0], settings(), 0.05).unwrap();
    assert_eq!(d1.status, OutcomeStatus::Completed);
    assert_eq!(d1.records.len(), 3);
    assert!(d1.records.iter().all(|r| r.is_failed()));
    assert!(d1.records[0].direct.estimate.is_nan());
    // the fit fails on a constant outcome, but the complete-case count is still reported
    assert_eq!(d1.records[0].n_obs, 600);
    assert_eq!(d1.records[2].n_obs, 0);
    assert!(d1.significant.is_empty());

    let d2 = run_outcome(&data, "E1", &candidates, &outcomes[1], settings(), 0.05).unwrap();
    assert_eq!(d2.status, OutcomeStatus::Completed);
    assert_eq!(d2.records.len(), 3);
    assert_eq!(d2.records[0].mediator, "P1");
    assert!(!d2.records[0].is_failed());
    assert!(!d2.records[1].is_failed());
    assert!(d2.records[2].is_failed());
    assert!(d2.records[0].indirect.p_adjusted >= d2.records[0].indirect.p_value);
    assert!(d2.significant.iter().any(|r| r.mediator == "P1"));
    assert!(d2.significant.iter().all(|r| r.indirect.p_adjusted < 0.05));
}

#[test]
fn female_only_outcome_is_not_applicable_in_men() {
    let data = simulate_stratum(Stratum::Male, 200, 3, 5);
    let outcomes = catalog().outcomes;
    let candidates = vec!["P1".to_string(), "P2".to_string()];
    let d3 = run_outcome(&data, "E1", &candidates, &outcomes[2], settings(), 0.05).unwrap();
    assert_eq!(d3.status, OutcomeStatus::NotApplicable);
    assert!(d3.records.is_empty());
    assert!(d3.significant.is_empty());
}

#[test]
fn no_candidates_short_circuits() {
    let data = simulate_stratum(Stratum::Female, 200, 3, 6);
    let outcomes = catalog().outcomes;
    let result = run_outcome(&data, "E1", &[], &outcomes[1], settings(), 0.05).unwrap();
    assert_eq!(result.status, OutcomeStatus::NoCandidates);
    assert!(result.records.is_empty());
}
