use glmkit::linalg::{cholesky, spd_inverse, spd_solve, weighted_crossprod};
use glmkit::stats::{two_sided_normal_p, wald_normal};
use glmkit::{FitError, IrlsControl, cluster_robust_vcov, fit_logistic, fit_ols};
use ndarray::{Array1, Array2, array};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal, Uniform};

fn design(x: &[f64]) -> Array2<f64> {
    let mut out = Array2::<f64>::ones((x.len(), 2));
    for (i, v) in x.iter().enumerate() {
        out[(i, 1)] = *v;
    }
    out
}

#[test]
fn cholesky_solves_spd_system() {
    let a = array![[4.0, 2.0, 0.6], [2.0, 3.0, 0.4], [0.6, 0.4, 2.0]];
    let b = array![1.0, 2.0, 3.0];
    let x = spd_solve(a.view(), b.view()).expect("solve");
    let back = a.dot(&x);
    for i in 0..3 {
        assert!((back[i] - b[i]).abs() < 1e-12);
    }
    let inv = spd_inverse(a.view()).expect("inverse");
    let eye = a.dot(&inv);
    for i in 0..3 {
        for j in 0..3 {
            let want = if i == j { 1.0 } else { 0.0 };
            assert!((eye[(i, j)] - want).abs() < 1e-10);
        }
    }
}

#[test]
fn cholesky_rejects_singular_matrix() {
    let a = array![[1.0, 2.0], [2.0, 4.0]];
    assert_eq!(cholesky(a.view()).unwrap_err(), FitError::Singular);
}

#[test]
fn cholesky_factor_is_lower_triangular() {
    let a = array![[4.0, 2.0], [2.0, 3.0]];
    let l = cholesky(a.view()).expect("factor");
    assert_eq!(l[(0, 1)], 0.0);
    let back = l.dot(&l.t());
    for i in 0..2 {
        for j in 0..2 {
            assert!((back[(i, j)] - a[(i, j)]).abs() < 1e-12);
        }
    }
}

#[test]
fn weighted_crossprod_scales_rows() {
    let x = array![[1.0, 2.0], [1.0, -1.0], [1.0, 0.5]];
    let w = array![2.0, 0.0, 1.0];
    let got = weighted_crossprod(x.view(), w.view());
    let want = array![[3.0, 4.5], [4.5, 8.25]];
    for i in 0..2 {
        for j in 0..2 {
            assert!((got[(i, j)] - want[(i, j)]).abs() < 1e-12);
        }
    }
}

#[test]
fn ols_recovers_linear_coefficients() {
    let mut rng = StdRng::seed_from_u64(7);
    let n = 400;
    let x: Vec<f64> = (0..n).map(|_| StandardNormal.sample(&mut rng)).collect();
    let y: Array1<f64> = x
        .iter()
        .map(|v| {
            let e: f64 = StandardNormal.sample(&mut rng);
            1.5 + 0.8 * v + 0.5 * e
        })
        .collect();
    let fit = fit_ols(design(&x).view(), y.view()).expect("ols");
    assert_eq!(fit.df_resid, n - 2);
    let slope = fit.coefficient(1, 0.95);
    assert!((slope.estimate - 0.8).abs() < 0.1);
    assert!(slope.ci_low < slope.estimate && slope.estimate < slope.ci_high);
    assert!(slope.p_value < 1e-20);
    assert!((fit.sigma() - 0.5).abs() < 0.1);
}

#[test]
fn ols_reports_rank_deficiency() {
    let n = 20;
    let mut x = Array2::<f64>::ones((n, 3));
    for i in 0..n {
        x[(i, 1)] = i as f64;
        x[(i, 2)] = 2.0 * i as f64;
    }
    let y = Array1::from_iter((0..n).map(|i| i as f64 * 0.3));
    assert_eq!(fit_ols(x.view(), y.view()).unwrap_err(), FitError::Singular);
}

#[test]
fn ols_needs_residual_degrees_of_freedom() {
    let x = design(&[1.0, 2.0]);
    let y = array![1.0, 2.0];
    assert!(matches!(
        fit_ols(x.view(), y.view()),
        Err(FitError::TooFewObservations { observed: 2, parameters: 2 })
    ));
}

#[test]
fn logistic_recovers_log_odds() {
    let mut rng = StdRng::seed_from_u64(11);
    let unif = Uniform::new(0.0, 1.0);
    let n = 6000;
    let x: Vec<f64> = (0..n).map(|_| StandardNormal.sample(&mut rng)).collect();
    let y: Array1<f64> = x
        .iter()
        .map(|v| {
            let p = glmkit::logistic::inv_logit(-0.5 + 0.7 * v);
            if unif.sample(&mut rng) < p { 1.0 } else { 0.0 }
        })
        .collect();
    let fit = fit_logistic(design(&x).view(), y.view(), None, IrlsControl::default())
        .expect("logistic");
    let b = fit.coefficient(1, 0.95);
    assert!((b.estimate - 0.7).abs() < 0.1);
    assert!((fit.coefficients[0] + 0.5).abs() < 0.1);
    assert!(fit.iterations < 15);

    let clusters: Vec<usize> = (0..n).collect();
    let robust = cluster_robust_vcov(&fit, design(&x).view(), y.view(), None, &clusters)
        .expect("sandwich");
    let ratio = robust[(1, 1)].sqrt() / b.se;
    assert!(ratio > 0.85 && ratio < 1.15, "ratio {ratio}");
}

#[test]
fn logistic_rejects_outcome_without_events() {
    let x = design(&[0.1, 0.5, 0.9, 1.3, 1.7, 2.1]);
    let y = Array1::<f64>::zeros(6);
    assert_eq!(
        fit_logistic(x.view(), y.view(), None, IrlsControl::default()).unwrap_err(),
        FitError::DegenerateResponse
    );
}

#[test]
fn logistic_flags_perfect_separation() {
    let xs: Vec<f64> = (1..=20).map(|v| v as f64).collect();
    let y = Array1::from_iter(xs.iter().map(|v| if *v > 10.0 { 1.0 } else { 0.0 }));
    let err = fit_logistic(design(&xs).view(), y.view(), None, IrlsControl::default())
        .unwrap_err();
    assert!(matches!(
        err,
        FitError::Separation | FitError::NonConvergence(_) | FitError::Singular
    ));
}

#[test]
fn duplicated_subjects_widen_robust_errors() {
    let mut rng = StdRng::seed_from_u64(3);
    let unif = Uniform::new(0.0, 1.0);
    let n = 1500;
    let x: Vec<f64> = (0..n).map(|_| StandardNormal.sample(&mut rng)).collect();
    let y: Vec<f64> = x
        .iter()
        .map(|v| {
            let p = glmkit::logistic::inv_logit(0.4 * v);
            if unif.sample(&mut rng) < p { 1.0 } else { 0.0 }
        })
        .collect();
    // each subject appears twice; the model-based SE treats 2n rows as independent
    let xx: Vec<f64> = x.iter().flat_map(|v| [*v, *v]).collect();
    let yy: Array1<f64> = y.iter().flat_map(|v| [*v, *v]).collect();
    let clusters: Vec<usize> = (0..n).flat_map(|i| [i, i]).collect();
    let d = design(&xx);
    let fit = fit_logistic(d.view(), yy.view(), None, IrlsControl::default()).expect("fit");
    let robust = cluster_robust_vcov(&fit, d.view(), yy.view(), None, &clusters).expect("vcov");
    let ratio = robust[(1, 1)].sqrt() / fit.vcov[(1, 1)].sqrt();
    assert!((ratio - std::f64::consts::SQRT_2).abs() < 0.2, "ratio {ratio}");
}

#[test]
fn wald_normal_matches_reference_values() {
    assert!((two_sided_normal_p(1.959964) - 0.05).abs() < 1e-6);
    let c = wald_normal(0.5, 0.25, 0.95);
    assert!((c.statistic - 2.0).abs() < 1e-12);
    assert!((c.ci_low - (0.5 - 1.959964 * 0.25)).abs() < 1e-5);
    assert!(two_sided_normal_p(8.0) > 0.0);
    assert!(wald_normal(0.1, 0.0, 0.95).p_value.is_nan());
}
